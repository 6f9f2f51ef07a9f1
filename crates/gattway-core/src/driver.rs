//! Trait seam between the gateway and the radio stack.
//!
//! [`RadioDriver`] covers adapter-level operations (scanning, connecting);
//! [`DeviceLink`] covers one established connection. The production
//! implementation lives in [`crate::btle`]; [`crate::mock`] provides a
//! scripted pair for tests. The gateway itself never touches btleplug
//! directly, which is what makes the session cache and dispatcher testable
//! without hardware.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use uuid::Uuid;

use gattway_types::{AdvertisedDevice, CharacteristicInfo, ScanSelector, ServiceInfo};

use crate::error::Result;

/// One raw device-initiated push as delivered by the radio stack.
///
/// Carries the full (service, characteristic) tuple: characteristic UUIDs
/// are only unique within one service's list, so the characteristic alone
/// does not identify the pushing attribute.
#[derive(Debug, Clone)]
pub struct RawNotification {
    /// UUID of the service that owns the pushing characteristic.
    pub service_uuid: Uuid,
    /// UUID of the characteristic that pushed the value.
    pub characteristic_uuid: Uuid,
    /// The pushed payload.
    pub payload: Bytes,
}

/// Stream of raw pushes from one connection.
pub type NotificationStream = Pin<Box<dyn Stream<Item = RawNotification> + Send>>;

/// Adapter-level radio operations.
#[async_trait]
pub trait RadioDriver: Send + Sync {
    /// Scan for advertising devices matching the selector.
    ///
    /// An empty result is not an error.
    async fn scan(
        &self,
        selector: &ScanSelector,
        duration: Duration,
    ) -> Result<Vec<AdvertisedDevice>>;

    /// Connect to a device by its stable address.
    ///
    /// This is a connection-establishing operation against hardware and may
    /// block for a radio round trip. Fails with
    /// [`Error::DeviceNotFound`](crate::Error::DeviceNotFound) if the
    /// address cannot be located.
    async fn connect(&self, address: &str) -> Result<Arc<dyn DeviceLink>>;
}

/// Operations on one established device connection.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Enumerate the device's primary services.
    ///
    /// May perform attribute discovery against the device.
    async fn list_primary_services(&self) -> Result<Vec<ServiceInfo>>;

    /// Enumerate the characteristics of one service.
    async fn list_characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>>;

    /// Read a characteristic value (blocking radio round trip).
    ///
    /// Addressed by the full (service, characteristic) tuple; the same
    /// characteristic UUID may appear under more than one service.
    async fn read_value(&self, service: Uuid, characteristic: Uuid) -> Result<Bytes>;

    /// Hand a payload to the send path without waiting for acknowledgment.
    async fn write_without_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<()>;

    /// Enable device-initiated pushes for a characteristic.
    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()>;

    /// Disable device-initiated pushes for a characteristic.
    async fn unsubscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()>;

    /// The stream of raw pushes for this connection.
    ///
    /// Consumed once, by the session's appender task.
    async fn notifications(&self) -> Result<NotificationStream>;

    /// Whether the stack still reports the connection as established.
    async fn is_connected(&self) -> bool;
}
