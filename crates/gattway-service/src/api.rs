//! REST API endpoints for the gattway service.
//!
//! Every device endpoint is addressed purely by `(address, service UUID,
//! characteristic UUID)`; the gateway establishes and caches sessions
//! behind the scenes, so a cold device and a warm device answer the same
//! routes. Path UUIDs accept the full 128-bit form and the 16/32-bit short
//! forms, which are expanded against the Bluetooth base UUID before they
//! reach the core.
//!
//! # Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]: lookup
//! misses and empty notification drains are 404, malformed UUIDs and
//! unsupported capabilities are 400, radio faults are 502, and exceeded
//! wait bounds are 504.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use gattway_core::Error;
use gattway_types::{
    AdvertisedDevice, CharacteristicInfo, NotificationRecord, ScanSelector, ServiceInfo,
    parse_ble_uuid,
};

use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/devices/discover", get(discover_devices))
        .route("/devices/{address}", get(check_connection))
        .route("/devices/{address}/services", get(list_services))
        .route(
            "/devices/{address}/service/{service}",
            get(list_characteristics),
        )
        .route(
            "/devices/{address}/service/{service}/characteristic/{characteristic}/read",
            get(read_characteristic),
        )
        .route(
            "/devices/{address}/service/{service}/characteristic/{characteristic}/write",
            post(write_characteristic),
        )
        .route(
            "/devices/{address}/service/{service}/characteristic/{characteristic}/register_notify",
            post(register_notify),
        )
        .route(
            "/devices/{address}/service/{service}/characteristic/{characteristic}/unregister_notify",
            post(unregister_notify),
        )
        .route(
            "/devices/{address}/service/{service}/characteristic/{characteristic}/notifications",
            get(get_notifications),
        )
}

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum AppError {
    /// Malformed path or body input.
    BadRequest(String),
    /// Core gateway failure.
    Gateway(Error),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::Gateway(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Gateway(e) => {
                let status = match &e {
                    Error::NoData { .. } => StatusCode::NOT_FOUND,
                    Error::Unsupported { .. } => StatusCode::BAD_REQUEST,
                    Error::Hardware { .. } => StatusCode::BAD_GATEWAY,
                    Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ if e.is_not_found() => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

fn parse_path_uuid(kind: &str, input: &str) -> Result<Uuid, AppError> {
    parse_ble_uuid(input)
        .map_err(|e| AppError::BadRequest(format!("invalid {kind} UUID: {e}")))
}

/// Service banner.
async fn index() -> String {
    format!("gattway-service {}", env!("CARGO_PKG_VERSION"))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Query parameters for device discovery.
#[derive(Debug, Default, Deserialize)]
pub struct DiscoverParams {
    /// Exact advertised name to match.
    pub name: Option<String>,
    /// Advertised name prefix to match.
    pub name_prefix: Option<String>,
}

/// Scan for advertising devices.
async fn discover_devices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DiscoverParams>,
) -> Result<Json<Vec<AdvertisedDevice>>, AppError> {
    let selector = ScanSelector {
        name: params.name,
        name_prefix: params.name_prefix,
    };
    Ok(Json(state.gateway.scan(&selector).await?))
}

/// Connection state response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub connected: bool,
}

/// Report whether a device currently answers on its link.
async fn check_connection(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<ConnectionResponse>, AppError> {
    let connected = state.gateway.check_connection(&address).await?;
    Ok(Json(ConnectionResponse { connected }))
}

/// List a device's primary services.
async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<ServiceInfo>>, AppError> {
    Ok(Json(state.gateway.list_services(&address).await?))
}

/// List a service's characteristics.
async fn list_characteristics(
    State(state): State<Arc<AppState>>,
    Path((address, service)): Path<(String, String)>,
) -> Result<Json<Vec<CharacteristicInfo>>, AppError> {
    let service = parse_path_uuid("service", &service)?;
    Ok(Json(
        state.gateway.list_characteristics(&address, service).await?,
    ))
}

/// Read response carrying the raw value bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub value: Vec<u8>,
}

/// Read a characteristic's current value.
async fn read_characteristic(
    State(state): State<Arc<AppState>>,
    Path((address, service, characteristic)): Path<(String, String, String)>,
) -> Result<Json<ReadResponse>, AppError> {
    let service = parse_path_uuid("service", &service)?;
    let characteristic = parse_path_uuid("characteristic", &characteristic)?;
    let value = state
        .gateway
        .read(&address, service, characteristic)
        .await?;
    Ok(Json(ReadResponse {
        value: value.to_vec(),
    }))
}

/// Write request body.
///
/// Values are truncated to bytes, so callers may send any integers whose
/// low eight bits they mean.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub message: Vec<i64>,
}

/// Write a payload to a characteristic, without response.
async fn write_characteristic(
    State(state): State<Arc<AppState>>,
    Path((address, service, characteristic)): Path<(String, String, String)>,
    Json(request): Json<WriteRequest>,
) -> Result<StatusCode, AppError> {
    let service = parse_path_uuid("service", &service)?;
    let characteristic = parse_path_uuid("characteristic", &characteristic)?;
    let payload: Vec<u8> = request.message.iter().map(|v| *v as u8).collect();
    state
        .gateway
        .write(&address, service, characteristic, &payload)
        .await?;
    Ok(StatusCode::OK)
}

/// Start buffering a characteristic's notifications.
async fn register_notify(
    State(state): State<Arc<AppState>>,
    Path((address, service, characteristic)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let service = parse_path_uuid("service", &service)?;
    let characteristic = parse_path_uuid("characteristic", &characteristic)?;
    state
        .gateway
        .register_notify(&address, service, characteristic)
        .await?;
    Ok(StatusCode::OK)
}

/// Stop buffering the device's notifications and discard its queue.
async fn unregister_notify(
    State(state): State<Arc<AppState>>,
    Path((address, service, characteristic)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let service = parse_path_uuid("service", &service)?;
    let characteristic = parse_path_uuid("characteristic", &characteristic)?;
    state
        .gateway
        .unregister_notify(&address, service, characteristic)
        .await?;
    Ok(StatusCode::OK)
}

/// Drain the buffered notifications for a characteristic, oldest first.
///
/// Returns 404 when nothing is buffered, so pollers can tell "no events
/// yet" apart from an event with an empty payload.
async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Path((address, service, characteristic)): Path<(String, String, String)>,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    let service = parse_path_uuid("service", &service)?;
    let characteristic = parse_path_uuid("characteristic", &characteristic)?;
    Ok(Json(
        state
            .gateway
            .drain_notifications(&address, service, characteristic)
            .await?,
    ))
}
