//! HTTP REST gateway exposing BLE GATT devices.
//!
//! This crate wraps [`gattway_core`]'s session cache in an axum server, so
//! any HTTP client can walk a device's attribute tree and consume its
//! notifications without speaking BLE:
//!
//! - `GET /api/health` - service health check
//! - `GET /devices/discover?name=&name_prefix=` - scan for advertisers
//! - `GET /devices/{address}` - connection check
//! - `GET /devices/{address}/services` - primary services
//! - `GET /devices/{address}/service/{service}` - characteristics
//! - `GET  .../characteristic/{characteristic}/read` - read value
//! - `POST .../characteristic/{characteristic}/write` - write value
//! - `POST .../characteristic/{characteristic}/register_notify`
//! - `POST .../characteristic/{characteristic}/unregister_notify`
//! - `GET  .../characteristic/{characteristic}/notifications` - drain queue
//!
//! # Configuration
//!
//! The service reads an optional TOML file passed via `--config`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [radio]
//! connect_timeout_secs = 15
//! scan_duration_secs = 5
//! ```

pub mod api;
pub mod config;
pub mod state;

pub use api::router;
pub use config::{Config, ConfigError, RadioConfig, ServerConfig};
pub use state::AppState;
