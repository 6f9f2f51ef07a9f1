//! btleplug-backed radio driver.
//!
//! [`BtleDriver`] binds the gateway to the host's first Bluetooth adapter
//! and hands out [`BtleLink`] connections over btleplug peripherals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use gattway_types::{
    AdvertisedDevice, CharProp, CharacteristicInfo, CharacteristicProps, ScanSelector, ServiceInfo,
};

use crate::driver::{DeviceLink, NotificationStream, RadioDriver, RawNotification};
use crate::error::{Error, Result};

/// Radio driver over the host's first Bluetooth adapter.
pub struct BtleDriver {
    adapter: Adapter,
}

impl BtleDriver {
    /// Bind to the first available Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters.into_iter().next().ok_or_else(Error::no_adapter)?;
        Ok(Self { adapter })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        let wanted = address.to_lowercase();
        for peripheral in self.adapter.peripherals().await? {
            if let Ok(Some(props)) = peripheral.properties().await {
                if props.address.to_string().to_lowercase() == wanted {
                    return Ok(Some(peripheral));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl RadioDriver for BtleDriver {
    async fn scan(
        &self,
        selector: &ScanSelector,
        duration: Duration,
    ) -> Result<Vec<AdvertisedDevice>> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(duration).await;
        self.adapter.stop_scan().await?;

        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let props = match peripheral.properties().await {
                Ok(Some(props)) => props,
                Ok(None) => continue,
                Err(e) => {
                    debug!("skipping peripheral without properties: {}", e);
                    continue;
                }
            };
            if !selector.matches(props.local_name.as_deref()) {
                continue;
            }
            found.push(AdvertisedDevice {
                name: props.local_name,
                address: props.address.to_string(),
                // btleplug does not expose bond state
                paired: false,
                rssi: props.rssi,
            });
        }
        Ok(found)
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn DeviceLink>> {
        let mut peripheral = self.find_peripheral(address).await?;

        // Not in the adapter's cache yet: scan briefly and look again.
        if peripheral.is_none() {
            debug!(%address, "peripheral not cached, scanning");
            self.adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
            self.adapter.stop_scan().await?;
            peripheral = self.find_peripheral(address).await?;
        }

        let peripheral = peripheral.ok_or_else(|| Error::device_not_found(address))?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;
        debug!(%address, "connected and discovered");

        Ok(Arc::new(BtleLink { peripheral }))
    }
}

/// One connected btleplug peripheral.
pub struct BtleLink {
    peripheral: Peripheral,
}

impl BtleLink {
    fn characteristic(
        &self,
        service: Uuid,
        uuid: Uuid,
    ) -> Result<btleplug::api::Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == uuid)
            .ok_or_else(|| {
                Error::hardware(format!(
                    "characteristic {uuid} not present under service {service}"
                ))
            })
    }

    /// Read the Characteristic User Description descriptor (0x2901), if any.
    async fn user_description(&self, c: &btleplug::api::Characteristic) -> Option<String> {
        let descriptor = c
            .descriptors
            .iter()
            .find(|d| d.uuid == USER_DESCRIPTION_DESCRIPTOR)?;
        let raw = self.peripheral.read_descriptor(descriptor).await.ok()?;
        let text = String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string();
        (!text.is_empty()).then_some(text)
    }
}

const USER_DESCRIPTION_DESCRIPTOR: Uuid = uuid::uuid!("00002901-0000-1000-8000-00805f9b34fb");

fn props_from_flags(flags: CharPropFlags) -> CharacteristicProps {
    let mut props = CharacteristicProps::empty();
    for (flag, prop) in [
        (CharPropFlags::BROADCAST, CharProp::Broadcast),
        (CharPropFlags::READ, CharProp::Read),
        (
            CharPropFlags::WRITE_WITHOUT_RESPONSE,
            CharProp::WriteWithoutResponse,
        ),
        (CharPropFlags::WRITE, CharProp::Write),
        (CharPropFlags::NOTIFY, CharProp::Notify),
        (CharPropFlags::INDICATE, CharProp::Indicate),
        (
            CharPropFlags::AUTHENTICATED_SIGNED_WRITES,
            CharProp::AuthenticatedSignedWrites,
        ),
        (
            CharPropFlags::EXTENDED_PROPERTIES,
            CharProp::ExtendedProperties,
        ),
    ] {
        if flags.contains(flag) {
            props.insert(prop);
        }
    }
    props
}

#[async_trait]
impl DeviceLink for BtleLink {
    async fn list_primary_services(&self) -> Result<Vec<ServiceInfo>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|service| service.primary)
            .map(|service| ServiceInfo {
                uuid: service.uuid,
                is_primary: service.primary,
            })
            .collect())
    }

    async fn list_characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>> {
        let chars: Vec<btleplug::api::Characteristic> = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service)
            .map(|s| s.characteristics.into_iter().collect())
            .unwrap_or_default();

        let mut infos = Vec::with_capacity(chars.len());
        for c in chars {
            let mut info = CharacteristicInfo::new(c.uuid, props_from_flags(c.properties));
            info.user_description = self.user_description(&c).await;
            infos.push(info);
        }
        Ok(infos)
    }

    async fn read_value(&self, service: Uuid, characteristic: Uuid) -> Result<Bytes> {
        let c = self.characteristic(service, characteristic)?;
        let value = self.peripheral.read(&c).await?;
        Ok(Bytes::from(value))
    }

    async fn write_without_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<()> {
        let c = self.characteristic(service, characteristic)?;
        self.peripheral
            .write(&c, payload, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()> {
        let c = self.characteristic(service, characteristic)?;
        self.peripheral.subscribe(&c).await?;
        Ok(())
    }

    async fn unsubscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()> {
        let c = self.characteristic(service, characteristic)?;
        if let Err(e) = self.peripheral.unsubscribe(&c).await {
            // The peripheral may already be gone; nothing left to undo.
            warn!(%characteristic, "unsubscribe failed: {}", e);
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        // btleplug value notifications carry only the characteristic UUID;
        // recover the owning service from the discovered attribute table.
        let owners: HashMap<Uuid, Uuid> = self
            .peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c.service_uuid))
            .collect();

        let stream = self.peripheral.notifications().await?;
        Ok(Box::pin(stream.map(move |n| RawNotification {
            service_uuid: owners.get(&n.uuid).copied().unwrap_or(Uuid::nil()),
            characteristic_uuid: n.uuid,
            payload: Bytes::from(n.value),
        })))
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }
}
