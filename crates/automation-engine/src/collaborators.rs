//! Interfaces the engine consumes, with adapters for `home-devices`

use async_trait::async_trait;
use home_devices::{DeviceRegistry, DeviceSnapshot, GeofenceRegion, LocationTracker, UdpDispatcher};
use std::sync::Arc;

/// Read access to cached device state
pub trait DeviceSource: Send + Sync {
    fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot>;
}

/// Geofence registration on the location tracker
pub trait GeofenceMonitor: Send + Sync {
    fn register_geofence(&self, automation_id: &str, region: &GeofenceRegion);
    fn unregister_geofence(&self, automation_id: &str);
}

/// Device control. Commands are fire-and-forget: transport failures are the
/// dispatcher's to log, the engine never sees them.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn send_power(&self, device_id: &str, on: bool);
    async fn send_color(&self, device_id: &str, r: u8, g: u8, b: u8, brightness: u8);
}

/// Delivers a titled message to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str);
}

/// Everything the engine talks to besides its own storage
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn DeviceSource>,
    pub geofences: Arc<dyn GeofenceMonitor>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub notifier: Arc<dyn Notifier>,
}

impl DeviceSource for DeviceRegistry {
    fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        DeviceRegistry::snapshot(self, device_id)
    }
}

impl GeofenceMonitor for LocationTracker {
    fn register_geofence(&self, automation_id: &str, region: &GeofenceRegion) {
        self.register(automation_id, region.clone());
    }

    fn unregister_geofence(&self, automation_id: &str) {
        self.unregister(automation_id);
    }
}

#[async_trait]
impl CommandDispatcher for UdpDispatcher {
    async fn send_power(&self, device_id: &str, on: bool) {
        if let Err(e) = UdpDispatcher::send_power(self, device_id, on).await {
            tracing::warn!("Power command to {} not sent: {}", device_id, e);
        }
    }

    async fn send_color(&self, device_id: &str, r: u8, g: u8, b: u8, brightness: u8) {
        if let Err(e) = UdpDispatcher::send_color(self, device_id, r, g, b, brightness).await {
            tracing::warn!("Color command to {} not sent: {}", device_id, e);
        }
    }
}
