//! Engine configuration

use crate::history::DEFAULT_HISTORY_LIMIT;
use std::time::Duration;

/// Tunables for the automation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum time between two firings of the same automation
    pub cooldown: Duration,
    /// Period of the time-trigger tick
    pub tick_interval: Duration,
    /// Maximum retained execution records
    pub history_limit: usize,
    /// Blob key of the automation collection
    pub automations_key: String,
    /// Blob key of the execution history
    pub history_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            tick_interval: Duration::from_secs(60),
            history_limit: DEFAULT_HISTORY_LIMIT,
            automations_key: "automations".to_string(),
            history_key: "automation_history".to_string(),
        }
    }
}
