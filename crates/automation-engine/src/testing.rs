//! Recording fakes for the collaborator traits

use crate::collaborators::{
    Collaborators, CommandDispatcher, DeviceSource, GeofenceMonitor, Notifier,
};
use crate::model::{Action, Automation, Trigger};
use async_trait::async_trait;
use chrono::Utc;
use home_devices::{DeviceSnapshot, GeofenceRegion};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeHome {
    pub devices: Mutex<HashMap<String, DeviceSnapshot>>,
    pub commands: Mutex<Vec<String>>,
    pub notifications: Mutex<Vec<(String, String)>>,
    pub geofence_calls: Mutex<Vec<String>>,
}

impl FakeHome {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_device(&self, snapshot: DeviceSnapshot) {
        self.devices
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn geofence_calls(&self) -> Vec<String> {
        self.geofence_calls.lock().unwrap().clone()
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            devices: self.clone(),
            geofences: self.clone(),
            dispatcher: self.clone(),
            notifier: self.clone(),
        }
    }
}

impl DeviceSource for FakeHome {
    fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.devices.lock().unwrap().get(device_id).cloned()
    }
}

impl GeofenceMonitor for FakeHome {
    fn register_geofence(&self, automation_id: &str, region: &GeofenceRegion) {
        self.geofence_calls
            .lock()
            .unwrap()
            .push(format!("register {automation_id} {}", region.name));
    }

    fn unregister_geofence(&self, automation_id: &str) {
        self.geofence_calls
            .lock()
            .unwrap()
            .push(format!("unregister {automation_id}"));
    }
}

#[async_trait]
impl CommandDispatcher for FakeHome {
    async fn send_power(&self, device_id: &str, on: bool) {
        self.commands
            .lock()
            .unwrap()
            .push(format!("power {device_id} {on}"));
    }

    async fn send_color(&self, device_id: &str, r: u8, g: u8, b: u8, brightness: u8) {
        self.commands
            .lock()
            .unwrap()
            .push(format!("color {device_id} {r} {g} {b} {brightness}"));
    }
}

#[async_trait]
impl Notifier for FakeHome {
    async fn notify(&self, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}

/// Enabled automation with empty run-state
pub fn automation(id: &str, trigger: Trigger, actions: Vec<Action>) -> Automation {
    let now = Utc::now();
    Automation {
        id: id.to_string(),
        name: format!("automation {id}"),
        enabled: true,
        icon: None,
        color: None,
        trigger,
        actions,
        last_triggered_at: None,
        execution_count: 0,
        created_at: now,
        updated_at: now,
    }
}
