//! Core library for the GATT gateway.
//!
//! This crate sits between a Bluetooth radio and a synchronous caller: it
//! caches one session per device (connection plus discovered attribute
//! tree), buffers asynchronous notifications into per-device FIFO queues,
//! and exposes every GATT operation through the [`Gateway`] facade.
//!
//! # Features
//!
//! - **Lazy sessions**: a device's connection and attribute tree are
//!   established on first touch and reused until explicitly invalidated
//! - **Single-flight discovery**: concurrent first touches of one device
//!   share one connect-and-discover; other devices proceed in parallel
//! - **Notification buffering**: pushes from armed characteristics queue
//!   in arrival order and drain at most once
//! - **Driver seam**: [`RadioDriver`] and [`DeviceLink`] abstract the
//!   radio, with a btleplug implementation and an in-memory mock
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gattway_core::{BtleDriver, Gateway, LinkConfig};
//! use gattway_types::parse_ble_uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = Arc::new(BtleDriver::new().await?);
//!     let gateway = Gateway::new(driver, LinkConfig::default());
//!
//!     let service = parse_ble_uuid("180f")?;
//!     let characteristic = parse_ble_uuid("2a19")?;
//!     let value = gateway
//!         .read("AA:BB:CC:DD:EE:FF", service, characteristic)
//!         .await?;
//!     println!("battery: {}%", value[0]);
//!     Ok(())
//! }
//! ```

pub mod btle;
pub mod config;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod index;
pub mod mock;
pub mod notify;
pub mod session;

pub use btle::{BtleDriver, BtleLink};
pub use config::LinkConfig;
pub use driver::{DeviceLink, NotificationStream, RadioDriver, RawNotification};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use gateway::Gateway;
pub use index::AttributeIndex;
pub use mock::{MockDriver, MockLink, MockLinkBuilder};
pub use notify::NotificationBuffer;
pub use session::{DeviceSession, SessionCache};
