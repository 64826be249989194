//! Device and location endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use home_devices::{Device, DeviceError, DeviceKind, DeviceSnapshot, Transport};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::{ApiResponse, AppState};

/// A device definition with its latest state
#[derive(Serialize)]
struct DeviceView {
    #[serde(flatten)]
    device: Device,
    snapshot: Option<DeviceSnapshot>,
}

/// Register device request
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub transport: Transport,
    /// `ip:port`, or a bare IP that gets the configured command port
    #[serde(default)]
    pub address: Option<String>,
}

/// Position report from the user's phone
#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
}

fn parse_address(s: &str, default_port: u16) -> Option<SocketAddr> {
    let s = s.trim();
    s.parse::<SocketAddr>()
        .ok()
        .or_else(|| s.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, default_port)))
}

/// List all devices with their snapshots
pub async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    let mut devices: Vec<DeviceView> = state
        .registry
        .get_devices()
        .into_iter()
        .map(|device| DeviceView {
            snapshot: state.registry.snapshot(&device.id),
            device,
        })
        .collect();
    devices.sort_by(|a, b| a.device.name.cmp(&b.device.name));
    Json(ApiResponse::success(devices))
}

/// Register or replace a device definition
pub async fn register_device(
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceRequest>,
) -> impl IntoResponse {
    let address = match req.address.as_deref() {
        Some(raw) => match parse_address(raw, state.config.device_command_port) {
            Some(address) => Some(address),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(format!("Invalid device address: {raw}"))),
                )
            }
        },
        None => None,
    };

    let device = Device {
        id: req.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: req.name,
        kind: req.kind,
        transport: req.transport,
        address,
    };
    state.registry.upsert_device(device.clone());
    (StatusCode::CREATED, Json(ApiResponse::success(device)))
}

/// Remove a device definition
pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.registry.remove_device(&id) {
        Some(device) => (StatusCode::OK, Json(ApiResponse::success(device))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Device not found")),
        ),
    }
}

/// Accept a freshly polled snapshot
pub async fn update_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut snapshot): Json<DeviceSnapshot>,
) -> impl IntoResponse {
    snapshot.id = id;
    match state.registry.update_snapshot(snapshot) {
        Ok(changed) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "changed": changed }))),
        ),
        Err(e @ DeviceError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// Feed a new position to the geofence tracker
pub async fn update_location(
    State(state): State<AppState>,
    Json(req): Json<LocationUpdate>,
) -> impl IntoResponse {
    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Coordinates out of range")),
        );
    }

    let crossings = state.tracker.update_position(req.latitude, req.longitude);
    (StatusCode::OK, Json(ApiResponse::success(crossings)))
}
