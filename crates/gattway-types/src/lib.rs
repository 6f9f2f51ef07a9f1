//! Platform-agnostic types for the gattway BLE gateway.
//!
//! This crate defines the data model shared between the core gateway logic
//! and its HTTP surface: service and characteristic descriptors, the
//! characteristic property set, buffered notification records, and scan
//! results. Nothing here touches a Bluetooth stack; the `gattway-core`
//! crate maps these types onto a real radio driver.

pub mod types;
pub mod uuid;

pub use types::{
    AdvertisedDevice, CharProp, CharacteristicInfo, CharacteristicProps, NotificationRecord,
    ScanSelector, ServiceInfo,
};
pub use uuid::{parse_ble_uuid, UuidParseError, BLUETOOTH_BASE_UUID};
