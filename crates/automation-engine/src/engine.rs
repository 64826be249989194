//! Core automation engine

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::AutomationError;
use crate::evaluator::{EvalContext, TriggerEvaluator};
use crate::executor::ActionExecutor;
use crate::history::ExecutionHistory;
use crate::model::{
    Automation, CreateAutomationRequest, ExecutionRecord, Trigger, UpdateAutomationRequest,
};
use crate::persistence::BlobStore;
use crate::scheduler::{EngineEvent, Scheduler};
use crate::store::AutomationStore;
use chrono::{DateTime, Utc};
use home_devices::{DeviceSnapshot, GeofenceEvent, RegistryEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Handle to an execution running in the background
pub type ExecutionHandle = JoinHandle<ExecutionRecord>;

/// Events emitted by the automation engine
#[derive(Debug, Clone)]
pub enum AutomationEvent {
    /// An automation was created
    Created { automation_id: String },
    /// An automation was updated
    Updated { automation_id: String },
    /// An automation was deleted
    Deleted { automation_id: String },
    /// An automation was enabled or disabled
    Toggled {
        automation_id: String,
        enabled: bool,
    },
    /// An automation fired and its actions are starting
    Triggered {
        automation_id: String,
        trigger_reason: String,
    },
    /// An automation finished executing
    Executed(ExecutionRecord),
}

/// Mutable engine state. One lock serializes every read-modify-write of the
/// automation collection and the history log.
struct EngineState {
    automations: AutomationStore,
    history: ExecutionHistory,
}

/// The main automation engine
pub struct AutomationEngine {
    state: Mutex<EngineState>,
    /// Trigger evaluator
    evaluator: TriggerEvaluator,
    /// Action executor
    executor: ActionExecutor,
    /// Tick and event sources
    scheduler: Scheduler,
    /// Event broadcaster
    event_tx: broadcast::Sender<AutomationEvent>,
}

impl AutomationEngine {
    /// Create a new automation engine, loading persisted automations and
    /// history from `blobs`
    pub async fn new(
        config: EngineConfig,
        blobs: Arc<dyn BlobStore>,
        collaborators: Collaborators,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        let automations = AutomationStore::load(
            blobs.clone(),
            &config.automations_key,
            collaborators.geofences.clone(),
        )
        .await;
        let history =
            ExecutionHistory::load(blobs, &config.history_key, config.history_limit).await;

        tracing::info!(
            "Automation engine loaded {} automations and {} history records",
            automations.list().len(),
            history.len()
        );

        Self {
            state: Mutex::new(EngineState {
                automations,
                history,
            }),
            evaluator: TriggerEvaluator::new(config.cooldown),
            executor: ActionExecutor::new(&collaborators),
            scheduler: Scheduler::new(config.tick_interval),
            event_tx,
        }
    }

    /// Start the tick source and the event loop
    pub fn start(self: &Arc<Self>) {
        self.scheduler.start(Arc::clone(self));
    }

    /// Forward registry snapshot changes into the event loop
    pub fn watch_devices(&self, rx: broadcast::Receiver<RegistryEvent>) {
        self.scheduler.watch_devices(rx);
    }

    /// Forward geofence crossings into the event loop
    pub fn watch_geofences(&self, rx: broadcast::Receiver<GeofenceEvent>) {
        self.scheduler.watch_geofences(rx);
    }

    /// Sender for pushing events into the engine from other sources
    pub fn event_sender(&self) -> mpsc::Sender<EngineEvent> {
        self.scheduler.sender()
    }

    /// Subscribe to automation events
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.event_tx.subscribe()
    }

    /// Get all automations
    pub async fn list(&self) -> Vec<Automation> {
        self.state.lock().await.automations.list().to_vec()
    }

    /// Get automation by ID
    pub async fn get(&self, id: &str) -> Option<Automation> {
        self.state.lock().await.automations.get(id).cloned()
    }

    /// Create a new automation
    pub async fn create(
        &self,
        request: CreateAutomationRequest,
    ) -> Result<Automation, AutomationError> {
        request.trigger.validate()?;
        let automation = Automation::from_request(request);

        self.state
            .lock()
            .await
            .automations
            .add(automation.clone())
            .await?;

        let _ = self.event_tx.send(AutomationEvent::Created {
            automation_id: automation.id.clone(),
        });

        tracing::info!(
            "Created automation: {} ({}, {} trigger)",
            automation.name,
            automation.id,
            automation.trigger.kind()
        );
        Ok(automation)
    }

    /// Update an automation
    pub async fn update(
        &self,
        id: &str,
        request: UpdateAutomationRequest,
    ) -> Result<Automation, AutomationError> {
        if let Some(trigger) = &request.trigger {
            trigger.validate()?;
        }

        let mut state = self.state.lock().await;
        let mut automation = state
            .automations
            .get(id)
            .cloned()
            .ok_or_else(|| AutomationError::NotFound(id.to_string()))?;
        automation.apply_update(request);
        state.automations.update(automation.clone()).await?;
        drop(state);

        let _ = self.event_tx.send(AutomationEvent::Updated {
            automation_id: id.to_string(),
        });

        tracing::info!("Updated automation: {}", id);
        Ok(automation)
    }

    /// Delete an automation
    pub async fn delete(&self, id: &str) -> Result<Automation, AutomationError> {
        let automation = self.state.lock().await.automations.delete(id).await?;

        let _ = self.event_tx.send(AutomationEvent::Deleted {
            automation_id: id.to_string(),
        });

        tracing::info!("Deleted automation: {} ({})", automation.name, id);
        Ok(automation)
    }

    /// Flip the enabled flag of an automation
    pub async fn toggle(&self, id: &str) -> Result<Automation, AutomationError> {
        let automation = self.state.lock().await.automations.toggle_enabled(id).await?;

        let _ = self.event_tx.send(AutomationEvent::Toggled {
            automation_id: id.to_string(),
            enabled: automation.enabled,
        });

        tracing::info!(
            "Automation '{}' {}",
            automation.name,
            if automation.enabled { "enabled" } else { "disabled" }
        );
        Ok(automation)
    }

    /// Execution history, newest first
    pub async fn history(&self) -> Vec<ExecutionRecord> {
        self.state.lock().await.history.records()
    }

    /// Execution history of one automation, newest first
    pub async fn history_for(&self, automation_id: &str) -> Vec<ExecutionRecord> {
        self.state.lock().await.history.for_automation(automation_id)
    }

    /// Drop all execution records
    pub async fn clear_history(&self) -> Result<(), AutomationError> {
        self.state.lock().await.history.clear().await?;
        tracing::info!("Cleared automation history");
        Ok(())
    }

    /// Run an automation immediately, bypassing its trigger and cooldown
    pub async fn run_now(&self, id: &str) -> Result<ExecutionRecord, AutomationError> {
        let automation = {
            let mut state = self.state.lock().await;
            let automation = state
                .automations
                .get(id)
                .cloned()
                .ok_or_else(|| AutomationError::NotFound(id.to_string()))?;
            if !automation.enabled {
                return Err(AutomationError::Disabled(id.to_string()));
            }
            state.automations.mark_fired(id, Utc::now());
            automation
        };

        Ok(self.execute_automation(automation, "manual").await)
    }

    /// Evaluate time-triggered automations against the wall clock
    pub async fn handle_tick(self: &Arc<Self>, ctx: EvalContext<'_>) -> Vec<ExecutionHandle> {
        let fired = self
            .collect_fired(Some(ctx.now), |automation| {
                matches!(automation.trigger, Trigger::Time { .. })
                    && self.evaluator.should_fire(automation, &ctx)
            })
            .await;
        self.spawn_executions(fired, "schedule")
    }

    /// Evaluate device-driven automations against one polled snapshot
    pub async fn handle_device_update(
        self: &Arc<Self>,
        snapshot: &DeviceSnapshot,
        ctx: EvalContext<'_>,
    ) -> Vec<ExecutionHandle> {
        let ctx = ctx.with_device(snapshot);
        let fired = self
            .collect_fired(Some(ctx.now), |automation| {
                automation.trigger.device_id() == Some(snapshot.id.as_str())
                    && self.evaluator.should_fire(automation, &ctx)
            })
            .await;
        self.spawn_executions(fired, "device_state")
    }

    /// Fire the automation owning a crossed geofence if the direction matches
    pub async fn handle_geofence(
        self: &Arc<Self>,
        automation_id: &str,
        did_enter: bool,
    ) -> Vec<ExecutionHandle> {
        let fired = self
            // Crossings are edge events with no cooldown
            .collect_fired(None, |automation| {
                automation.id == automation_id
                    && self.evaluator.geofence_matches(automation, did_enter)
            })
            .await;
        let reason = if did_enter { "geofence_enter" } else { "geofence_exit" };
        self.spawn_executions(fired, reason)
    }

    /// Select automations to fire. With a `stamp`, they are marked as fired
    /// so the next pass sees them cooling down.
    async fn collect_fired<F>(
        &self,
        stamp: Option<DateTime<Utc>>,
        mut predicate: F,
    ) -> Vec<Automation>
    where
        F: FnMut(&Automation) -> bool,
    {
        let mut state = self.state.lock().await;
        let fired: Vec<Automation> = state
            .automations
            .list()
            .iter()
            .filter(|a| predicate(a))
            .cloned()
            .collect();
        if let Some(now) = stamp {
            for automation in &fired {
                state.automations.mark_fired(&automation.id, now);
            }
        }
        fired
    }

    fn spawn_executions(
        self: &Arc<Self>,
        fired: Vec<Automation>,
        reason: &'static str,
    ) -> Vec<ExecutionHandle> {
        fired
            .into_iter()
            .map(|automation| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.execute_automation(automation, reason).await })
            })
            .collect()
    }

    /// Execute an automation and record the outcome
    async fn execute_automation(
        &self,
        automation: Automation,
        trigger_reason: &str,
    ) -> ExecutionRecord {
        tracing::info!(
            "Executing automation '{}' (trigger: {})",
            automation.name,
            trigger_reason
        );

        let _ = self.event_tx.send(AutomationEvent::Triggered {
            automation_id: automation.id.clone(),
            trigger_reason: trigger_reason.to_string(),
        });

        let record = self.executor.execute(&automation).await;
        if !record.success {
            tracing::warn!(
                "Automation '{}' finished with failures: {}",
                automation.name,
                record.message
            );
        }

        {
            let mut state = self.state.lock().await;
            if let Err(e) = state
                .automations
                .record_run(&automation.id, record.timestamp)
                .await
            {
                tracing::warn!(
                    "Failed to record run of automation '{}': {}",
                    automation.name,
                    e
                );
            }
            if let Err(e) = state.history.append(record.clone()).await {
                tracing::warn!("Failed to save automation history: {}", e);
            }
        }

        let _ = self.event_tx.send(AutomationEvent::Executed(record.clone()));
        record
    }
}
