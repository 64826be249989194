//! Action executor for automations

use crate::collaborators::{Collaborators, CommandDispatcher, DeviceSource, Notifier};
use crate::error::AutomationError;
use crate::model::{Action, Automation, ExecutionRecord};
use chrono::Utc;
use home_devices::DeviceSnapshot;
use std::sync::Arc;

/// Brightness used when a device has no LED state yet
const FULL_BRIGHTNESS: u8 = 100;
const WHITE: (u8, u8, u8) = (255, 255, 255);

/// Executor for automation actions
pub struct ActionExecutor {
    devices: Arc<dyn DeviceSource>,
    dispatcher: Arc<dyn CommandDispatcher>,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    /// Create a new action executor
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            devices: collaborators.devices.clone(),
            dispatcher: collaborators.dispatcher.clone(),
            notifier: collaborators.notifier.clone(),
        }
    }

    /// Run every action in order and fold the outcomes into one record.
    ///
    /// A failing action never stops the ones after it.
    pub async fn execute(&self, automation: &Automation) -> ExecutionRecord {
        let mut success = true;
        let mut messages = Vec::with_capacity(automation.actions.len());

        for (index, action) in automation.actions.iter().enumerate() {
            match self.execute_action(automation, action).await {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!(
                        "Action {} of automation '{}' failed: {}",
                        index,
                        automation.name,
                        e
                    );
                    success = false;
                    messages.push(e.to_string());
                }
            }
        }

        ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            automation_id: automation.id.clone(),
            automation_name: automation.name.clone(),
            timestamp: Utc::now(),
            success,
            message: messages.join("; "),
        }
    }

    /// Execute a single action, returning its outcome message
    async fn execute_action(
        &self,
        automation: &Automation,
        action: &Action,
    ) -> Result<String, AutomationError> {
        match action {
            Action::TurnOn { device_id } => self.execute_power(device_id, true).await,
            Action::TurnOff { device_id } => self.execute_power(device_id, false).await,
            Action::SetColor { device_id, color } => {
                let device = self.resolve(device_id)?;
                let (r, g, b) = parse_color(color)?;
                let brightness = device
                    .led
                    .map_or(FULL_BRIGHTNESS, |led| led.brightness);
                self.dispatcher
                    .send_color(device_id, r, g, b, brightness)
                    .await;
                Ok(format!(
                    "Set {} color to #{r:02X}{g:02X}{b:02X}",
                    device.display_name()
                ))
            }
            Action::SetBrightness {
                device_id,
                brightness,
            } => {
                let device = self.resolve(device_id)?;
                let brightness = parse_brightness(brightness)?;
                let (r, g, b) = device
                    .led
                    .map_or(WHITE, |led| (led.red, led.green, led.blue));
                self.dispatcher
                    .send_color(device_id, r, g, b, brightness)
                    .await;
                Ok(format!(
                    "Set {} brightness to {brightness}%",
                    device.display_name()
                ))
            }
            Action::Notify { message } => {
                let body = message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .map_or_else(
                        || format!("Automation '{}' was triggered", automation.name),
                        str::to_string,
                    );
                self.notifier.notify(&automation.name, &body).await;
                Ok("Notification sent".to_string())
            }
            Action::SendEmail { to, .. } => {
                tracing::warn!(
                    "Email actions are not implemented; nothing sent to {}",
                    to
                );
                Ok(format!("Email to {to} accepted"))
            }
        }
    }

    async fn execute_power(&self, device_id: &str, on: bool) -> Result<String, AutomationError> {
        let device = self.resolve(device_id)?;
        self.dispatcher.send_power(device_id, on).await;
        Ok(format!(
            "Turned {} {}",
            if on { "on" } else { "off" },
            device.display_name()
        ))
    }

    fn resolve(&self, device_id: &str) -> Result<DeviceSnapshot, AutomationError> {
        self.devices
            .snapshot(device_id)
            .ok_or_else(|| AutomationError::DeviceNotFound(device_id.to_string()))
    }
}

/// Parse `#RRGGBB` or `RRGGBB`
fn parse_color(s: &str) -> Result<(u8, u8, u8), AutomationError> {
    let hex = s.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AutomationError::InvalidColor(s.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| AutomationError::InvalidColor(s.to_string()))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

/// Parse an integer percentage in 0..=100
fn parse_brightness(s: &str) -> Result<u8, AutomationError> {
    match s.trim().parse::<u8>() {
        Ok(value) if value <= 100 => Ok(value),
        _ => Err(AutomationError::InvalidBrightness(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Trigger;
    use crate::testing::{self, FakeHome};
    use home_devices::LedState;

    fn setup() -> (ActionExecutor, Arc<FakeHome>) {
        let home = FakeHome::new();
        home.add_device(DeviceSnapshot::new("led-1", "Desk"));
        let mut lamp = DeviceSnapshot::new("led-2", "Lamp");
        lamp.led = Some(LedState {
            on: true,
            red: 10,
            green: 20,
            blue: 30,
            brightness: 35,
        });
        home.add_device(lamp);
        (ActionExecutor::new(&home.collaborators()), home)
    }

    fn automation(actions: Vec<Action>) -> Automation {
        let trigger = Trigger::Time {
            hour: 19,
            minute: 0,
            days: vec![],
        };
        let mut automation = testing::automation("a1", trigger, actions);
        automation.name = "Evening".to_string();
        automation
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let (executor, home) = setup();
        let record = executor
            .execute(&automation(vec![
                Action::TurnOn {
                    device_id: "led-1".to_string(),
                },
                Action::TurnOff {
                    device_id: "missing".to_string(),
                },
                Action::Notify {
                    message: Some("done".to_string()),
                },
            ]))
            .await;

        assert!(!record.success);
        assert_eq!(record.automation_id, "a1");
        let parts: Vec<&str> = record.message.split("; ").collect();
        assert_eq!(
            parts,
            vec![
                "Turned on Desk",
                "Device not found: missing",
                "Notification sent"
            ]
        );
        assert_eq!(home.commands(), vec!["power led-1 true"]);
        assert_eq!(
            home.notifications(),
            vec![("Evening".to_string(), "done".to_string())]
        );
    }

    #[tokio::test]
    async fn test_all_success() {
        let (executor, home) = setup();
        let record = executor
            .execute(&automation(vec![
                Action::SetColor {
                    device_id: "led-2".to_string(),
                    color: "#FF8000".to_string(),
                },
                Action::SetColor {
                    device_id: "led-1".to_string(),
                    color: "00ff00".to_string(),
                },
                Action::SendEmail {
                    to: "me@example.com".to_string(),
                    subject: None,
                },
            ]))
            .await;

        assert!(record.success, "{}", record.message);
        assert_eq!(
            home.commands(),
            vec!["color led-2 255 128 0 35", "color led-1 0 255 0 100"]
        );
    }

    #[tokio::test]
    async fn test_brightness_falls_back_to_white() {
        let (executor, home) = setup();
        let record = executor
            .execute(&automation(vec![
                Action::SetBrightness {
                    device_id: "led-1".to_string(),
                    brightness: "60".to_string(),
                },
                Action::SetBrightness {
                    device_id: "led-2".to_string(),
                    brightness: " 5 ".to_string(),
                },
            ]))
            .await;

        assert!(record.success);
        assert_eq!(
            home.commands(),
            vec!["color led-1 255 255 255 60", "color led-2 10 20 30 5"]
        );
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let (executor, home) = setup();
        let record = executor
            .execute(&automation(vec![
                Action::SetColor {
                    device_id: "led-1".to_string(),
                    color: "orange".to_string(),
                },
                Action::SetBrightness {
                    device_id: "led-1".to_string(),
                    brightness: "bright".to_string(),
                },
                Action::SetBrightness {
                    device_id: "led-1".to_string(),
                    brightness: "150".to_string(),
                },
            ]))
            .await;

        assert!(!record.success);
        assert_eq!(record.message.split("; ").count(), 3);
        assert!(record.message.starts_with("Invalid color: orange"));
        assert!(home.commands().is_empty());
    }

    #[tokio::test]
    async fn test_notify_default_text() {
        let (executor, home) = setup();
        executor
            .execute(&automation(vec![Action::Notify { message: None }]))
            .await;
        assert_eq!(
            home.notifications()[0].1,
            "Automation 'Evening' was triggered"
        );
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#0a0B0c").unwrap(), (10, 11, 12));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#GG0000").is_err());
        assert!(parse_color("#\u{e9}\u{e9}\u{e9}").is_err());
    }
}
