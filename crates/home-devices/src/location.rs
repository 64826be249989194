//! Geofence monitoring
//!
//! Regions are registered per automation. Feeding a new position into the
//! tracker emits an event for every region whose inside/outside state flipped.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A named circular region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl GeofenceRegion {
    /// Whether a position lies inside the region (boundary inclusive)
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        distance_meters(self.latitude, self.longitude, latitude, longitude) <= self.radius_meters
    }
}

/// A region boundary was crossed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeofenceEvent {
    /// Automation that owns the region
    pub automation_id: String,
    /// `true` on entry, `false` on exit
    pub did_enter: bool,
}

struct Monitored {
    region: GeofenceRegion,
    /// Unknown until the first position arrives
    inside: Option<bool>,
}

/// Tracks the current position against registered geofences
pub struct LocationTracker {
    regions: DashMap<String, Monitored>,
    event_tx: broadcast::Sender<GeofenceEvent>,
}

impl Default for LocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationTracker {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            regions: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to boundary crossings
    pub fn subscribe(&self) -> broadcast::Receiver<GeofenceEvent> {
        self.event_tx.subscribe()
    }

    /// Start monitoring a region for an automation, replacing any previous one
    pub fn register(&self, automation_id: &str, region: GeofenceRegion) {
        tracing::info!(
            "Monitoring geofence '{}' ({:.5}, {:.5}, r={}m) for automation {}",
            region.name,
            region.latitude,
            region.longitude,
            region.radius_meters,
            automation_id
        );
        self.regions.insert(
            automation_id.to_string(),
            Monitored {
                region,
                inside: None,
            },
        );
    }

    /// Stop monitoring the region of an automation
    pub fn unregister(&self, automation_id: &str) {
        if self.regions.remove(automation_id).is_some() {
            tracing::info!("Stopped monitoring geofence for automation {}", automation_id);
        }
    }

    /// Number of monitored regions
    #[must_use]
    pub fn monitored_count(&self) -> usize {
        self.regions.len()
    }

    /// Feed a new position and emit events for boundary crossings.
    ///
    /// The first position after registration only establishes the initial
    /// state; it never produces an event.
    pub fn update_position(&self, latitude: f64, longitude: f64) -> Vec<GeofenceEvent> {
        let mut events = Vec::new();

        for mut entry in self.regions.iter_mut() {
            let inside = entry.region.contains(latitude, longitude);
            let previous = entry.inside.replace(inside);
            if matches!(previous, Some(was_inside) if was_inside != inside) {
                events.push(GeofenceEvent {
                    automation_id: entry.key().clone(),
                    did_enter: inside,
                });
            }
        }

        for event in &events {
            tracing::debug!(
                "Geofence {} for automation {}",
                if event.did_enter { "entered" } else { "exited" },
                event.automation_id
            );
            let _ = self.event_tx.send(event.clone());
        }
        events
    }
}

/// Great-circle distance between two coordinates (haversine)
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}
