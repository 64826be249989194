//! Notifications for dashboard clients

use async_trait::async_trait;
use automation_engine::Notifier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// A message for the user
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Logs notifications and fans them out to connected WebSocket clients
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, title: &str, body: &str) {
        tracing::info!("Notification '{}': {}", title, body);
        // No receivers just means no dashboard is open
        let _ = self.tx.send(Notification {
            title: title.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
        });
    }
}
