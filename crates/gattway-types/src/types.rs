//! Core GATT data model.
//!
//! These types mirror the shape of a discovered attribute tree: a device
//! exposes primary services, each service exposes characteristics, and a
//! characteristic advertises a set of capability flags. Notification
//! payloads buffered by the gateway are represented as
//! [`NotificationRecord`]s.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A GATT service discovered on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Canonical 128-bit service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub is_primary: bool,
}

/// A single GATT characteristic capability flag.
///
/// The discriminants match the bit positions of the GATT characteristic
/// properties field (Core Spec Vol 3, Part G, 3.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharProp {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
    Indicate,
    AuthenticatedSignedWrites,
    ExtendedProperties,
}

impl CharProp {
    const ALL: [CharProp; 8] = [
        CharProp::Broadcast,
        CharProp::Read,
        CharProp::WriteWithoutResponse,
        CharProp::Write,
        CharProp::Notify,
        CharProp::Indicate,
        CharProp::AuthenticatedSignedWrites,
        CharProp::ExtendedProperties,
    ];

    const fn bit(self) -> u8 {
        match self {
            CharProp::Broadcast => 0x01,
            CharProp::Read => 0x02,
            CharProp::WriteWithoutResponse => 0x04,
            CharProp::Write => 0x08,
            CharProp::Notify => 0x10,
            CharProp::Indicate => 0x20,
            CharProp::AuthenticatedSignedWrites => 0x40,
            CharProp::ExtendedProperties => 0x80,
        }
    }
}

/// Set of capability flags advertised by a characteristic.
///
/// Stored as the raw GATT properties bit field; serialized as a list of
/// flag names so API consumers see `["Read", "Notify"]` rather than `0x12`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProps(u8);

impl CharacteristicProps {
    /// Empty property set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from the raw GATT properties bit field.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw bit field.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build a set from a slice of flags.
    pub fn from_props(props: &[CharProp]) -> Self {
        let mut bits = 0;
        for p in props {
            bits |= p.bit();
        }
        Self(bits)
    }

    /// Check whether the set contains a flag.
    pub const fn contains(self, prop: CharProp) -> bool {
        self.0 & prop.bit() != 0
    }

    /// Add a flag to the set.
    pub fn insert(&mut self, prop: CharProp) {
        self.0 |= prop.bit();
    }

    /// Whether the characteristic can deliver device-initiated pushes
    /// (either notifications or indications).
    pub const fn supports_push(self) -> bool {
        self.contains(CharProp::Notify) || self.contains(CharProp::Indicate)
    }

    /// Iterate over the flags in the set.
    pub fn iter(self) -> impl Iterator<Item = CharProp> {
        CharProp::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<CharProp> for CharacteristicProps {
    fn from_iter<I: IntoIterator<Item = CharProp>>(iter: I) -> Self {
        let mut set = Self::empty();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

impl Serialize for CharacteristicProps {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for CharacteristicProps {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let props = Vec::<CharProp>::deserialize(deserializer)?;
        Ok(props.into_iter().collect())
    }
}

/// A GATT characteristic discovered within a service.
///
/// The driver-side handle is deliberately absent: the connection link that
/// produced this descriptor resolves UUIDs back to its own handles, which
/// keeps the descriptor serializable and platform-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicInfo {
    /// Canonical 128-bit characteristic UUID.
    pub uuid: Uuid,
    /// Optional user description descriptor value.
    pub user_description: Option<String>,
    /// Advertised capability flags.
    pub properties: CharacteristicProps,
}

impl CharacteristicInfo {
    /// Create a descriptor with no user description.
    pub fn new(uuid: Uuid, properties: CharacteristicProps) -> Self {
        Self {
            uuid,
            user_description: None,
            properties,
        }
    }
}

/// One buffered device-initiated push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// UUID of the service that owns the pushing characteristic.
    pub service_uuid: Uuid,
    /// UUID of the characteristic that pushed the value.
    pub characteristic_uuid: Uuid,
    /// Raw pushed payload.
    pub payload: Bytes,
    /// When the gateway received the push.
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

impl NotificationRecord {
    /// Create a record stamped with the current time.
    pub fn now(service_uuid: Uuid, characteristic_uuid: Uuid, payload: Bytes) -> Self {
        Self {
            service_uuid,
            characteristic_uuid,
            payload,
            received_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether the record matches a (service, characteristic) filter.
    pub fn matches(&self, service_uuid: Uuid, characteristic_uuid: Uuid) -> bool {
        self.service_uuid == service_uuid && self.characteristic_uuid == characteristic_uuid
    }
}

/// A device seen during a radio scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisedDevice {
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Stable address or platform identifier used for later connections.
    pub address: String,
    /// Whether the OS reports the device as paired.
    pub paired: bool,
    /// Signal strength of the advertisement, if reported.
    pub rssi: Option<i16>,
}

/// Name-based filter for radio scans.
///
/// An empty selector matches every advertising device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSelector {
    /// Exact advertised name to match.
    pub name: Option<String>,
    /// Advertised name prefix to match.
    pub name_prefix: Option<String>,
}

impl ScanSelector {
    /// Selector that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Whether any filter is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.name_prefix.is_none()
    }

    /// Check an advertised name against the selector.
    ///
    /// A device with no advertised name only matches an empty selector.
    pub fn matches(&self, advertised: Option<&str>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(name) = advertised else {
            return false;
        };
        if let Some(exact) = &self.name {
            if name == exact {
                return true;
            }
        }
        if let Some(prefix) = &self.name_prefix {
            if name.starts_with(prefix.as_str()) {
                return true;
            }
        }
        false
    }
}
