//! Error types for gattway-core.
//!
//! Every failure a gateway operation can hit maps to one structured
//! variant, so callers can tell an addressing mistake (wrong UUID, unknown
//! device) apart from a transient hardware fault or an exceeded wait bound.
//! Lookup misses are always recovered into these variants; nothing in the
//! core panics on a miss.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while operating on a BLE device through the gateway.
///
/// Marked `#[non_exhaustive]` to allow adding variants without breaking
/// downstream matches.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// The device could not be located or connected.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// No service with the given UUID exists on the device.
    #[error("service not found: {uuid}")]
    ServiceNotFound {
        /// The service UUID that missed.
        uuid: Uuid,
    },

    /// No characteristic with the given UUID exists within the service.
    #[error("characteristic not found: {uuid} (in service {service})")]
    CharacteristicNotFound {
        /// The characteristic UUID that missed.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
    },

    /// The characteristic lacks a capability the operation requires.
    #[error("characteristic {uuid} does not support notifications or indications")]
    Unsupported {
        /// The characteristic in question.
        uuid: Uuid,
    },

    /// A drain found no buffered records matching the filter.
    #[error("no notifications buffered for {characteristic} (service {service})")]
    NoData {
        /// The filtered service.
        service: Uuid,
        /// The filtered characteristic.
        characteristic: Uuid,
    },

    /// Driver-level fault reported by the radio stack.
    #[error("hardware failure: {message}")]
    Hardware {
        /// Description of the underlying fault.
        message: String,
    },

    /// A radio operation exceeded its wait bound.
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        duration: Duration,
    },
}

/// Reason why a device could not be resolved.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No device with this address was found or it refused the connection.
    #[error("device '{address}' not found")]
    NotFound {
        /// The requested address.
        address: String,
    },
    /// No Bluetooth adapter is available on this host.
    #[error("no Bluetooth adapter available")]
    NoAdapter,
}

impl Error {
    /// Device-not-found error for a specific address.
    pub fn device_not_found(address: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            address: address.into(),
        })
    }

    /// Service lookup miss.
    pub fn service_not_found(uuid: Uuid) -> Self {
        Self::ServiceNotFound { uuid }
    }

    /// Characteristic lookup miss within a service.
    pub fn characteristic_not_found(uuid: Uuid, service: Uuid) -> Self {
        Self::CharacteristicNotFound { uuid, service }
    }

    /// No usable Bluetooth adapter on the host.
    pub fn no_adapter() -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NoAdapter)
    }

    /// Timeout with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Missing notify/indicate capability.
    pub fn unsupported(uuid: Uuid) -> Self {
        Self::Unsupported { uuid }
    }

    /// Hardware fault with a description.
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }

    /// Empty drain result for a filter.
    pub fn no_data(service: Uuid, characteristic: Uuid) -> Self {
        Self::NoData {
            service,
            characteristic,
        }
    }

    /// Whether this error reports a lookup miss (device, service, or
    /// characteristic), as opposed to a hardware fault or timeout.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound(_) | Self::ServiceNotFound { .. } | Self::CharacteristicNotFound { .. }
        )
    }
}

impl From<btleplug::Error> for Error {
    fn from(err: btleplug::Error) -> Self {
        Self::Hardware {
            message: err.to_string(),
        }
    }
}

/// Result type alias using gattway-core's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
