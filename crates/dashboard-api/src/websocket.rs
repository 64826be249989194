//! WebSocket handler for real-time updates

use automation_engine::{AutomationEvent, ExecutionRecord};
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use home_devices::{DeviceSnapshot, RegistryEvent};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::notifier::Notification;
use crate::AppState;

/// WebSocket events sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    Connected,
    AutomationCreated { automation_id: String },
    AutomationUpdated { automation_id: String },
    AutomationDeleted { automation_id: String },
    AutomationToggled { automation_id: String, enabled: bool },
    AutomationTriggered {
        automation_id: String,
        trigger_reason: String,
    },
    AutomationExecuted { record: ExecutionRecord },
    DeviceAdded { device_id: String },
    DeviceRemoved { device_id: String },
    DeviceUpdated { snapshot: DeviceSnapshot },
    Notification(Notification),
}

impl From<AutomationEvent> for WsEvent {
    fn from(event: AutomationEvent) -> Self {
        match event {
            AutomationEvent::Created { automation_id } => Self::AutomationCreated { automation_id },
            AutomationEvent::Updated { automation_id } => Self::AutomationUpdated { automation_id },
            AutomationEvent::Deleted { automation_id } => Self::AutomationDeleted { automation_id },
            AutomationEvent::Toggled {
                automation_id,
                enabled,
            } => Self::AutomationToggled {
                automation_id,
                enabled,
            },
            AutomationEvent::Triggered {
                automation_id,
                trigger_reason,
            } => Self::AutomationTriggered {
                automation_id,
                trigger_reason,
            },
            AutomationEvent::Executed(record) => Self::AutomationExecuted { record },
        }
    }
}

impl WsEvent {
    /// Clients only care about state changes, not every poll
    fn from_registry(event: RegistryEvent) -> Option<Self> {
        match event {
            RegistryEvent::DeviceAdded(device) => Some(Self::DeviceAdded {
                device_id: device.id,
            }),
            RegistryEvent::DeviceRemoved { id } => Some(Self::DeviceRemoved { device_id: id }),
            RegistryEvent::SnapshotUpdated { snapshot, changed } => {
                changed.then_some(Self::DeviceUpdated { snapshot })
            }
        }
    }
}

/// Outcome of polling one broadcast source
enum Poll<T> {
    Event(T),
    Skip,
    Closed,
}

fn poll<T>(result: Result<T, RecvError>) -> Poll<T> {
    match result {
        Ok(event) => Poll::Event(event),
        Err(RecvError::Lagged(n)) => {
            tracing::debug!("WebSocket client lagged by {} events", n);
            Poll::Skip
        }
        Err(RecvError::Closed) => Poll::Closed,
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    if send_event(&mut sender, &WsEvent::Connected).await.is_err() {
        return;
    }

    let mut automation_rx = state.engine.subscribe();
    let mut device_rx = state.registry.subscribe();
    let mut notification_rx = state.notifier.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event: WsEvent = tokio::select! {
                result = automation_rx.recv() => match poll(result) {
                    Poll::Event(event) => event.into(),
                    Poll::Skip => continue,
                    Poll::Closed => break,
                },
                result = device_rx.recv() => match poll(result) {
                    Poll::Event(event) => match WsEvent::from_registry(event) {
                        Some(event) => event,
                        None => continue,
                    },
                    Poll::Skip => continue,
                    Poll::Closed => break,
                },
                result = notification_rx.recv() => match poll(result) {
                    Poll::Event(notification) => WsEvent::Notification(notification),
                    Poll::Skip => continue,
                    Poll::Closed => break,
                },
            };

            if send_event(&mut sender, &event).await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; drain until they go away
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
}

async fn send_event<S>(sender: &mut S, event: &WsEvent) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to encode WebSocket event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use home_devices::{Device, DeviceKind};

    #[test]
    fn test_event_tags() {
        let json = serde_json::to_value(WsEvent::AutomationToggled {
            automation_id: "a1".to_string(),
            enabled: false,
        })
        .unwrap();
        assert_eq!(json["type"], "automation_toggled");
        assert_eq!(json["enabled"], false);

        let json = serde_json::to_value(WsEvent::Notification(Notification {
            title: "Evening".to_string(),
            body: "Lights on".to_string(),
            timestamp: Utc::now(),
        }))
        .unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["body"], "Lights on");
    }

    #[test]
    fn test_registry_event_conversion() {
        let event = WsEvent::from_registry(RegistryEvent::DeviceRemoved {
            id: "led-1".to_string(),
        })
        .unwrap();
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "device_removed");
        assert_eq!(json["device_id"], "led-1");
    }

    #[test]
    fn test_unchanged_polls_are_not_pushed() {
        let snapshot = Device::new("led-1", "Desk", DeviceKind::Led).initial_snapshot();
        let steady = RegistryEvent::SnapshotUpdated {
            snapshot: snapshot.clone(),
            changed: false,
        };
        assert!(WsEvent::from_registry(steady).is_none());

        let changed = RegistryEvent::SnapshotUpdated {
            snapshot,
            changed: true,
        };
        let json = serde_json::to_value(WsEvent::from_registry(changed).unwrap()).unwrap();
        assert_eq!(json["type"], "device_updated");
        assert_eq!(json["snapshot"]["id"], "led-1");
    }
}
