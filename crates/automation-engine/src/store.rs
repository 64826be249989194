//! Automation store
//!
//! Holds the full automation collection in memory. Every mutation rewrites
//! the whole collection to the blob store and keeps geofence registrations
//! in step with location-triggered automations.

use crate::collaborators::GeofenceMonitor;
use crate::error::AutomationError;
use crate::model::Automation;
use crate::persistence::{self, BlobStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AutomationStore {
    automations: Vec<Automation>,
    store: Arc<dyn BlobStore>,
    key: String,
    geofences: Arc<dyn GeofenceMonitor>,
}

impl AutomationStore {
    /// Load the collection and register every geofence it contains
    pub async fn load(
        store: Arc<dyn BlobStore>,
        key: &str,
        geofences: Arc<dyn GeofenceMonitor>,
    ) -> Self {
        let automations: Vec<Automation> = persistence::load_list(store.as_ref(), key).await;
        for automation in &automations {
            if let Some(region) = automation.trigger.geofence_region() {
                geofences.register_geofence(&automation.id, region);
            }
        }
        Self {
            automations,
            store,
            key: key.to_string(),
            geofences,
        }
    }

    async fn save(&self) -> Result<(), AutomationError> {
        persistence::save_list(self.store.as_ref(), &self.key, &self.automations).await
    }

    /// All automations in insertion order
    pub fn list(&self) -> &[Automation] {
        &self.automations
    }

    pub fn get(&self, id: &str) -> Option<&Automation> {
        self.automations.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Automation, AutomationError> {
        self.automations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AutomationError::NotFound(id.to_string()))
    }

    /// Append a new automation
    pub async fn add(&mut self, automation: Automation) -> Result<(), AutomationError> {
        if self.get(&automation.id).is_some() {
            return Err(AutomationError::Duplicate(automation.id));
        }
        if let Some(region) = automation.trigger.geofence_region() {
            self.geofences.register_geofence(&automation.id, region);
        }
        self.automations.push(automation);
        self.save().await
    }

    /// Replace the automation with the same ID
    pub async fn update(&mut self, automation: Automation) -> Result<(), AutomationError> {
        let id = automation.id.clone();
        let region = automation.trigger.geofence_region().cloned();
        *self.get_mut(&id)? = automation;

        self.geofences.unregister_geofence(&id);
        if let Some(region) = &region {
            self.geofences.register_geofence(&id, region);
        }
        self.save().await
    }

    /// Remove an automation and release its geofence
    pub async fn delete(&mut self, id: &str) -> Result<Automation, AutomationError> {
        let index = self
            .automations
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| AutomationError::NotFound(id.to_string()))?;
        let removed = self.automations.remove(index);
        self.geofences.unregister_geofence(id);
        self.save().await?;
        Ok(removed)
    }

    /// Flip the enabled flag
    pub async fn toggle_enabled(&mut self, id: &str) -> Result<Automation, AutomationError> {
        let automation = self.get_mut(id)?;
        automation.enabled = !automation.enabled;
        automation.updated_at = Utc::now();
        let toggled = automation.clone();
        self.save().await?;
        Ok(toggled)
    }

    /// Stamp the fire time in memory so the cooldown holds while the
    /// actions are still running
    pub fn mark_fired(&mut self, id: &str, at: DateTime<Utc>) {
        if let Ok(automation) = self.get_mut(id) {
            automation.last_triggered_at = Some(at);
        }
    }

    /// Record a completed execution and persist
    pub async fn record_run(
        &mut self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<Automation, AutomationError> {
        let automation = self.get_mut(id)?;
        automation.last_triggered_at = Some(at);
        automation.execution_count += 1;
        let updated = automation.clone();
        self.save().await?;
        Ok(updated)
    }
}
