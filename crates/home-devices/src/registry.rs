//! Live registry of known devices and their latest snapshots

use crate::device::{Device, DeviceSnapshot};
use crate::error::DeviceError;
use crate::persistence::DeviceFile;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Registry events
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A device definition was added or replaced
    DeviceAdded(Device),
    /// A device definition was removed
    DeviceRemoved { id: String },
    /// A device poll was accepted. Sent for every poll so rules can be
    /// re-evaluated against a steady reading; `changed` is false when the
    /// state matches the cached one.
    SnapshotUpdated {
        snapshot: DeviceSnapshot,
        changed: bool,
    },
}

/// Device registry
pub struct DeviceRegistry {
    /// Device definitions (keyed by device ID)
    devices: Arc<DashMap<String, Device>>,
    /// Latest snapshot per device
    snapshots: DashMap<String, DeviceSnapshot>,
    /// Event broadcaster
    event_tx: broadcast::Sender<RegistryEvent>,
    /// Where definitions are saved, if anywhere
    file: Option<DeviceFile>,
}

impl DeviceRegistry {
    /// Create a registry backed by `<data_dir>/devices.json`
    pub async fn load(data_dir: &std::path::Path) -> Self {
        let file = DeviceFile::in_dir(data_dir);
        let devices = file.read_or_empty().await;
        let registry = Self::with_file(Some(file));
        for device in devices {
            registry
                .snapshots
                .insert(device.id.clone(), device.initial_snapshot());
            registry.devices.insert(device.id.clone(), device);
        }
        registry
    }

    /// Create a registry that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_file(None)
    }

    fn with_file(file: Option<DeviceFile>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            devices: Arc::new(DashMap::new()),
            snapshots: DashMap::new(),
            event_tx,
            file,
        }
    }

    /// Subscribe to registry events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    /// Persist device definitions in the background
    fn save_devices(&self) {
        let Some(file) = self.file.clone() else {
            return;
        };
        let devices: Vec<Device> = self.devices.iter().map(|r| r.value().clone()).collect();
        tokio::spawn(async move {
            if let Err(e) = file.write(&devices).await {
                tracing::warn!("Failed to save devices: {}", e);
            }
        });
    }

    /// Get all device definitions
    pub fn get_devices(&self) -> Vec<Device> {
        self.devices.iter().map(|r| r.value().clone()).collect()
    }

    /// Get a device definition by ID
    pub fn get_device(&self, id: &str) -> Option<Device> {
        self.devices.get(id).map(|r| r.value().clone())
    }

    /// Get the latest snapshot of a device
    pub fn snapshot(&self, id: &str) -> Option<DeviceSnapshot> {
        self.snapshots.get(id).map(|r| r.value().clone())
    }

    /// Get all snapshots
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        self.snapshots.iter().map(|r| r.value().clone()).collect()
    }

    /// Add or replace a device definition
    pub fn upsert_device(&self, device: Device) {
        tracing::info!("Registering device {} ({})", device.name, device.id);

        self.snapshots
            .entry(device.id.clone())
            .and_modify(|s| s.name = device.name.clone())
            .or_insert_with(|| device.initial_snapshot());
        self.devices.insert(device.id.clone(), device.clone());

        let _ = self.event_tx.send(RegistryEvent::DeviceAdded(device));
        self.save_devices();
    }

    /// Remove a device definition and its snapshot
    pub fn remove_device(&self, id: &str) -> Option<Device> {
        let removed = self.devices.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.snapshots.remove(id);
            let _ = self
                .event_tx
                .send(RegistryEvent::DeviceRemoved { id: id.to_string() });
            self.save_devices();
        }
        removed
    }

    /// Store a freshly polled snapshot.
    ///
    /// Emits [`RegistryEvent::SnapshotUpdated`] on every call. Returns
    /// whether the state differs from the cached one.
    pub fn update_snapshot(&self, mut snapshot: DeviceSnapshot) -> Result<bool, DeviceError> {
        let device = self
            .devices
            .get(&snapshot.id)
            .ok_or_else(|| DeviceError::NotFound(snapshot.id.clone()))?;
        snapshot.name = device.name.clone();
        drop(device);

        snapshot.updated_at = Some(Utc::now());

        let changed = self
            .snapshots
            .get(&snapshot.id)
            .map_or(true, |previous| !previous.same_state(&snapshot));

        self.snapshots.insert(snapshot.id.clone(), snapshot.clone());

        if changed {
            tracing::debug!("Snapshot changed for device {}", snapshot.id);
        }
        let _ = self
            .event_tx
            .send(RegistryEvent::SnapshotUpdated { snapshot, changed });
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, SensorReading};

    fn climate_snapshot(temperature: f64) -> DeviceSnapshot {
        let mut snapshot = DeviceSnapshot::new("climate-1", "");
        snapshot.online = true;
        snapshot.sensor = Some(SensorReading {
            temperature,
            humidity: 40.0,
        });
        snapshot
    }

    #[tokio::test]
    async fn test_every_poll_is_published() {
        let registry = DeviceRegistry::in_memory();
        registry.upsert_device(Device::new("climate-1", "Bedroom", DeviceKind::Climate));
        let mut rx = registry.subscribe();

        assert!(registry.update_snapshot(climate_snapshot(21.0)).unwrap());
        assert!(!registry.update_snapshot(climate_snapshot(21.0)).unwrap());
        assert!(registry.update_snapshot(climate_snapshot(22.5)).unwrap());

        let mut polls = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RegistryEvent::SnapshotUpdated { snapshot, changed } = event {
                polls.push((snapshot, changed));
            }
        }
        let flags: Vec<bool> = polls.iter().map(|(_, changed)| *changed).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(polls[2].0.sensor.unwrap().temperature, 22.5);
        assert_eq!(polls[2].0.name, "Bedroom");
        assert!(polls[1].0.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_unknown_device_fails() {
        let registry = DeviceRegistry::in_memory();
        let result = registry.update_snapshot(climate_snapshot(20.0));
        assert!(matches!(result, Err(DeviceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_device_drops_snapshot() {
        let registry = DeviceRegistry::in_memory();
        registry.upsert_device(Device::new("led-1", "Desk", DeviceKind::Led));
        assert!(registry.snapshot("led-1").is_some());

        assert!(registry.remove_device("led-1").is_some());
        assert!(registry.snapshot("led-1").is_none());
        assert!(registry.remove_device("led-1").is_none());
    }
}
