//! Tick source and event loop for automation triggers
//!
//! Everything that can fire an automation funnels into one channel: the
//! periodic tick for time triggers, device snapshot changes and geofence
//! crossings. A single dispatch task drains it and hands each event to the
//! engine.

use crate::engine::AutomationEngine;
use crate::evaluator::EvalContext;
use dashmap::DashMap;
use home_devices::{DeviceSnapshot, GeofenceEvent, RegistryEvent};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const EVENT_BUFFER: usize = 256;

/// Inputs to the engine's event loop
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Evaluate time triggers against the current wall clock
    Tick,
    /// A device poll was accepted
    DeviceUpdated(DeviceSnapshot),
    /// The monitored position crossed an automation's geofence
    GeofenceCrossed {
        automation_id: String,
        did_enter: bool,
    },
}

/// Owns the background tasks feeding the engine
pub struct Scheduler {
    tick_interval: Duration,
    event_tx: mpsc::Sender<EngineEvent>,
    /// Taken by [`Scheduler::start`]
    event_rx: Mutex<Option<mpsc::Receiver<EngineEvent>>>,
    /// Running tasks (keyed by role)
    tasks: DashMap<String, JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler ticking every `tick_interval`
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            tick_interval,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            tasks: DashMap::new(),
        }
    }

    /// Sender for pushing events into the loop
    pub fn sender(&self) -> mpsc::Sender<EngineEvent> {
        self.event_tx.clone()
    }

    /// Spawn the tick task and the dispatch task.
    ///
    /// The first tick fires immediately so time triggers are evaluated at
    /// startup. Calling this twice has no effect.
    pub fn start(&self, engine: Arc<AutomationEngine>) {
        let Some(mut rx) = self.event_rx.lock().ok().and_then(|mut rx| rx.take()) else {
            tracing::warn!("Automation scheduler already started");
            return;
        };

        let tx = self.event_tx.clone();
        let period = self.tick_interval;
        let tick = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(EngineEvent::Tick).await.is_err() {
                    break;
                }
            }
        });
        self.tasks.insert("tick".to_string(), tick);

        // Weak so the engine can drop while the loop is idle
        let engine: Weak<AutomationEngine> = Arc::downgrade(&engine);
        let dispatch = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                dispatch(&engine, event).await;
            }
            tracing::info!("Automation event loop stopped");
        });
        self.tasks.insert("dispatch".to_string(), dispatch);

        tracing::info!(
            "Automation scheduler started (tick every {:?})",
            self.tick_interval
        );
    }

    /// Forward every accepted device poll into the loop, changed or not,
    /// so a steady reading keeps firing once each cooldown expires
    pub fn watch_devices(&self, mut rx: broadcast::Receiver<RegistryEvent>) {
        let tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RegistryEvent::SnapshotUpdated { snapshot, .. }) => {
                        if tx.send(EngineEvent::DeviceUpdated(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Automation device listener lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Device event channel closed");
                        break;
                    }
                }
            }
        });
        self.replace_task("devices", handle);
    }

    /// Forward geofence crossings into the loop
    pub fn watch_geofences(&self, mut rx: broadcast::Receiver<GeofenceEvent>) {
        let tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(GeofenceEvent {
                        automation_id,
                        did_enter,
                    }) => {
                        let event = EngineEvent::GeofenceCrossed {
                            automation_id,
                            did_enter,
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Automation geofence listener lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Geofence event channel closed");
                        break;
                    }
                }
            }
        });
        self.replace_task("geofences", handle);
    }

    fn replace_task(&self, role: &str, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(role.to_string(), handle) {
            previous.abort();
        }
    }

    /// Number of running background tasks
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.value().is_finished()).count()
    }
}

async fn dispatch(engine: &Arc<AutomationEngine>, event: EngineEvent) {
    // Executions run detached; their outcome arrives as AutomationEvent::Executed
    match event {
        EngineEvent::Tick => {
            engine.handle_tick(EvalContext::now()).await;
        }
        EngineEvent::DeviceUpdated(snapshot) => {
            engine
                .handle_device_update(&snapshot, EvalContext::now())
                .await;
        }
        EngineEvent::GeofenceCrossed {
            automation_id,
            did_enter,
        } => {
            engine.handle_geofence(&automation_id, did_enter).await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}
