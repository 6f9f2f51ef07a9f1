//! Canonical UUID handling for GATT attributes.
//!
//! GATT attribute UUIDs come in three textual shapes: full 128-bit values,
//! and 16- or 32-bit short forms that are aliases into the Bluetooth base
//! UUID range. Lookups inside the gateway are always by canonical 128-bit
//! value, so every inbound identifier is normalized here first.

use thiserror::Error;
use uuid::Uuid;

/// The Bluetooth base UUID, `00000000-0000-1000-8000-00805f9b34fb`.
///
/// Short-form UUIDs are aliases for `0000xxxx-0000-1000-8000-00805f9b34fb`
/// (16-bit) or `xxxxxxxx-0000-1000-8000-00805f9b34fb` (32-bit).
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x00000000_0000_1000_8000_00805f9b34fb);

const BASE_U128: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Failure to normalize an inbound UUID string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid UUID '{input}': expected a 128-bit UUID or a 16/32-bit hex short form")]
pub struct UuidParseError {
    /// The rejected input.
    pub input: String,
}

/// Expand a 16- or 32-bit short UUID against the Bluetooth base UUID.
pub const fn from_short(value: u32) -> Uuid {
    Uuid::from_u128(BASE_U128 | ((value as u128) << 96))
}

/// Parse an attribute UUID in any accepted textual form.
///
/// Accepts full 128-bit UUIDs (case-insensitive, with or without hyphens,
/// as [`Uuid::parse_str`] does) and bare 4- or 8-digit hex short forms.
pub fn parse_ble_uuid(input: &str) -> Result<Uuid, UuidParseError> {
    let trimmed = input.trim();

    if matches!(trimmed.len(), 4 | 8) && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        // u32::from_str_radix cannot fail after the hexdigit check
        let value = u32::from_str_radix(trimmed, 16).map_err(|_| UuidParseError {
            input: input.to_string(),
        })?;
        return Ok(from_short(value));
    }

    Uuid::parse_str(trimmed).map_err(|_| UuidParseError {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::uuid;

    #[test]
    fn base_uuid_value() {
        assert_eq!(
            BLUETOOTH_BASE_UUID.to_string(),
            "00000000-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn short_16_bit_expansion() {
        // Battery service
        assert_eq!(
            from_short(0x180f),
            uuid!("0000180f-0000-1000-8000-00805f9b34fb")
        );
        // Battery level characteristic
        assert_eq!(
            from_short(0x2a19),
            uuid!("00002a19-0000-1000-8000-00805f9b34fb")
        );
    }

    #[test]
    fn short_32_bit_expansion() {
        assert_eq!(
            from_short(0xdead_beef),
            uuid!("deadbeef-0000-1000-8000-00805f9b34fb")
        );
    }

    #[test]
    fn parse_full_uuid() {
        let parsed = parse_ble_uuid("f0cd1400-95da-4f4b-9ac8-aa55d312af0c").unwrap();
        assert_eq!(parsed, uuid!("f0cd1400-95da-4f4b-9ac8-aa55d312af0c"));
    }

    #[test]
    fn parse_full_uuid_uppercase() {
        let parsed = parse_ble_uuid("F0CD1400-95DA-4F4B-9AC8-AA55D312AF0C").unwrap();
        assert_eq!(parsed, uuid!("f0cd1400-95da-4f4b-9ac8-aa55d312af0c"));
    }

    #[test]
    fn parse_short_forms() {
        assert_eq!(parse_ble_uuid("180f").unwrap(), from_short(0x180f));
        assert_eq!(parse_ble_uuid("180F").unwrap(), from_short(0x180f));
        assert_eq!(parse_ble_uuid("0000180f").unwrap(), from_short(0x180f));
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(parse_ble_uuid(" 180f ").unwrap(), from_short(0x180f));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_ble_uuid("").is_err());
        assert!(parse_ble_uuid("xyz").is_err());
        assert!(parse_ble_uuid("180").is_err());
        assert!(parse_ble_uuid("180fz").is_err());
        assert!(parse_ble_uuid("not-a-uuid-at-all").is_err());
    }

    #[test]
    fn parse_error_carries_input() {
        let err = parse_ble_uuid("bogus").unwrap_err();
        assert_eq!(err.input, "bogus");
        assert!(err.to_string().contains("bogus"));
    }
}
