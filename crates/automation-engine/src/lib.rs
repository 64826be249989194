//! Automation engine for the home dashboard
//!
//! Rule-based automations: a trigger decides when an automation fires and an
//! ordered list of actions controls devices or sends notifications. Devices,
//! geofences and notifications are reached through the traits in
//! [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod history;
pub mod model;
pub mod persistence;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use collaborators::{CommandDispatcher, Collaborators, DeviceSource, GeofenceMonitor, Notifier};
pub use config::EngineConfig;
pub use engine::{AutomationEngine, AutomationEvent, ExecutionHandle};
pub use error::AutomationError;
pub use evaluator::{EvalContext, TriggerEvaluator};
pub use model::*;
pub use persistence::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use scheduler::EngineEvent;
