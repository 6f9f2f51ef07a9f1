//! Immutable snapshot of one device's attribute tree.
//!
//! An [`AttributeIndex`] is built once per session from a single discovery
//! pass and replaced wholesale by a fresh discovery, never patched. Lookups
//! are exact-match on the canonical 128-bit UUID value, never partial, and
//! never trigger I/O.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use gattway_types::{CharacteristicInfo, ServiceInfo};

use crate::driver::DeviceLink;
use crate::error::{Error, Result};

/// UUID-keyed snapshot of a device's services and characteristics.
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    /// Services in discovery order.
    services: Vec<ServiceInfo>,
    /// Characteristics keyed by owning service UUID, in discovery order.
    characteristics: HashMap<Uuid, Vec<CharacteristicInfo>>,
}

impl AttributeIndex {
    /// Build an index by enumerating the device through an established link.
    ///
    /// Performs two sequential driver passes: primary services first, then
    /// each service's characteristics. This is the sole producer of an
    /// index; lookups afterwards are pure.
    pub async fn discover(link: &dyn DeviceLink) -> Result<Self> {
        let services = link.list_primary_services().await?;
        debug!(service_count = services.len(), "enumerated primary services");

        let mut characteristics = HashMap::with_capacity(services.len());
        for service in &services {
            let chars = link.list_characteristics(service.uuid).await?;
            debug!(
                service = %service.uuid,
                characteristic_count = chars.len(),
                "enumerated characteristics"
            );
            characteristics.insert(service.uuid, chars);
        }

        Ok(Self {
            services,
            characteristics,
        })
    }

    /// Build an index from an already-assembled snapshot.
    pub fn from_snapshot(snapshot: Vec<(ServiceInfo, Vec<CharacteristicInfo>)>) -> Self {
        let mut services = Vec::with_capacity(snapshot.len());
        let mut characteristics = HashMap::with_capacity(snapshot.len());
        for (service, chars) in snapshot {
            characteristics.insert(service.uuid, chars);
            services.push(service);
        }
        Self {
            services,
            characteristics,
        }
    }

    /// The device's services in discovery order.
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// Look up a service by canonical UUID.
    pub fn find_service(&self, uuid: Uuid) -> Result<&ServiceInfo> {
        self.services
            .iter()
            .find(|s| s.uuid == uuid)
            .ok_or(Error::ServiceNotFound { uuid })
    }

    /// The characteristics of a service, in discovery order.
    pub fn characteristics_of(&self, service: Uuid) -> Result<&[CharacteristicInfo]> {
        // A service present in `services` always has an entry in the map;
        // going through find_service keeps the miss error consistent.
        self.find_service(service)?;
        Ok(self
            .characteristics
            .get(&service)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Look up a characteristic by canonical UUID within a service.
    pub fn find_characteristic(&self, service: Uuid, uuid: Uuid) -> Result<&CharacteristicInfo> {
        self.characteristics_of(service)?
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or(Error::CharacteristicNotFound { uuid, service })
    }
}
