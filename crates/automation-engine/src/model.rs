//! Data models for the automation engine

use crate::error::AutomationError;
use chrono::{DateTime, Utc};
pub use home_devices::GeofenceRegion;
use serde::{Deserialize, Serialize};

/// A complete automation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Whether the automation is active
    pub enabled: bool,
    /// Dashboard icon name
    #[serde(default)]
    pub icon: Option<String>,
    /// Dashboard accent color
    #[serde(default)]
    pub color: Option<String>,
    /// What initiates the automation
    pub trigger: Trigger,
    /// Actions to execute, in order
    pub actions: Vec<Action>,
    /// When the automation last fired
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Number of completed executions
    #[serde(default)]
    pub execution_count: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Trigger types that can initiate an automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when the wall clock shows exactly this hour and minute
    Time {
        /// Hour (0-23)
        hour: u8,
        /// Minute (0-59)
        minute: u8,
        /// Days of week (0=Sunday, 1=Monday, ..., 6=Saturday).
        /// Empty means every day
        #[serde(default)]
        days: Vec<u8>,
    },
    /// Temperature or humidity compared against a threshold
    SensorThreshold {
        device_id: String,
        metric: SensorMetric,
        operator: ComparisonOperator,
        threshold: f64,
    },
    /// Gas sensor reports the warning level
    GasAlarm { device_id: String },
    /// Entry into or exit from a region
    Geofence {
        region: GeofenceRegion,
        direction: GeofenceDirection,
    },
    /// Device state change. Not evaluated; never fires
    DeviceState { device_id: String },
    /// Sunrise/sunset. Not evaluated; never fires
    Solar { event: SolarEvent },
}

/// Which sensor reading a threshold trigger looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorMetric {
    Temperature,
    Humidity,
}

/// Comparison applied to a sensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
}

/// Tolerance for `Equals`/`NotEquals`
pub const COMPARISON_EPSILON: f64 = 0.1;

impl ComparisonOperator {
    /// Apply the comparison as `value <op> threshold`
    #[must_use]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::Equals => (value - threshold).abs() < COMPARISON_EPSILON,
            Self::NotEquals => (value - threshold).abs() >= COMPARISON_EPSILON,
        }
    }
}

/// Geofence crossing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceDirection {
    Enter,
    Exit,
}

impl GeofenceDirection {
    #[must_use]
    pub fn matches(self, did_enter: bool) -> bool {
        match self {
            Self::Enter => did_enter,
            Self::Exit => !did_enter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolarEvent {
    Sunrise,
    Sunset,
}

impl Trigger {
    /// Short name used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Time { .. } => "time",
            Self::SensorThreshold { .. } => "sensor_threshold",
            Self::GasAlarm { .. } => "gas_alarm",
            Self::Geofence { .. } => "geofence",
            Self::DeviceState { .. } => "device_state",
            Self::Solar { .. } => "solar",
        }
    }

    /// Device this trigger is bound to, if any
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::SensorThreshold { device_id, .. }
            | Self::GasAlarm { device_id }
            | Self::DeviceState { device_id } => Some(device_id),
            _ => None,
        }
    }

    /// Re-evaluated on every device snapshot change
    #[must_use]
    pub fn is_device_driven(&self) -> bool {
        self.device_id().is_some()
    }

    /// Region to register with the location tracker
    #[must_use]
    pub fn geofence_region(&self) -> Option<&GeofenceRegion> {
        match self {
            Self::Geofence { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Reject values the evaluator could never match
    pub fn validate(&self) -> Result<(), AutomationError> {
        match self {
            Self::Time { hour, minute, days } => {
                if *hour > 23 || *minute > 59 {
                    return Err(AutomationError::InvalidTrigger(format!(
                        "time {hour:02}:{minute:02} is out of range"
                    )));
                }
                if let Some(day) = days.iter().find(|d| **d > 6) {
                    return Err(AutomationError::InvalidTrigger(format!(
                        "weekday {day} is out of range (0=Sunday..6=Saturday)"
                    )));
                }
            }
            Self::SensorThreshold { threshold, .. } if !threshold.is_finite() => {
                return Err(AutomationError::InvalidTrigger(
                    "threshold must be a finite number".to_string(),
                ));
            }
            Self::Geofence { region, .. } => {
                if !(region.radius_meters > 0.0)
                    || !(-90.0..=90.0).contains(&region.latitude)
                    || !(-180.0..=180.0).contains(&region.longitude)
                {
                    return Err(AutomationError::InvalidTrigger(format!(
                        "geofence '{}' has invalid coordinates or radius",
                        region.name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Actions to perform when an automation fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    TurnOn { device_id: String },
    TurnOff { device_id: String },
    /// Set an LED color, given as `#RRGGBB`
    SetColor { device_id: String, color: String },
    /// Set LED brightness, an integer percentage as entered by the user
    SetBrightness {
        device_id: String,
        brightness: String,
    },
    /// Send a notification; a default text is used when empty
    Notify {
        #[serde(default)]
        message: Option<String>,
    },
    /// Accepted but never delivered
    SendEmail {
        to: String,
        #[serde(default)]
        subject: Option<String>,
    },
}

/// Outcome of one automation firing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub automation_id: String,
    #[serde(default)]
    pub automation_name: String,
    pub timestamp: DateTime<Utc>,
    /// True only if every action succeeded
    pub success: bool,
    /// Per-action outcomes joined with "; "
    pub message: String,
}

/// Request to create a new automation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAutomationRequest {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
}

fn default_enabled() -> bool {
    true
}

/// Request to update an automation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAutomationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub icon: Option<Option<String>>,
    #[serde(default)]
    pub color: Option<Option<String>>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub actions: Option<Vec<Action>>,
}

impl Automation {
    /// Create a new automation from a create request
    pub fn from_request(request: CreateAutomationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            enabled: request.enabled,
            icon: request.icon,
            color: request.color,
            trigger: request.trigger,
            actions: request.actions,
            last_triggered_at: None,
            execution_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update request to this automation. Run-state is kept.
    pub fn apply_update(&mut self, update: UpdateAutomationRequest) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(icon) = update.icon {
            self.icon = icon;
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        if let Some(trigger) = update.trigger {
            self.trigger = trigger;
        }
        if let Some(actions) = update.actions {
            self.actions = actions;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greater_than_is_exclusive() {
        let op = ComparisonOperator::GreaterThan;
        assert!(op.compare(25.1, 25.0));
        assert!(!op.compare(24.9, 25.0));
        assert!(!op.compare(25.0, 25.0));
    }

    #[test]
    fn test_less_than_is_exclusive() {
        let op = ComparisonOperator::LessThan;
        assert!(op.compare(24.9, 25.0));
        assert!(!op.compare(25.0, 25.0));
    }

    #[test]
    fn test_equality_uses_epsilon() {
        assert!(ComparisonOperator::Equals.compare(25.05, 25.0));
        assert!(!ComparisonOperator::Equals.compare(25.2, 25.0));
        assert!(!ComparisonOperator::NotEquals.compare(25.05, 25.0));
        assert!(ComparisonOperator::NotEquals.compare(25.2, 25.0));
    }

    #[test]
    fn test_trigger_json_shape() {
        let trigger: Trigger = serde_json::from_value(serde_json::json!({
            "type": "sensor_threshold",
            "device_id": "climate-1",
            "metric": "temperature",
            "operator": "greater_than",
            "threshold": 25.0
        }))
        .unwrap();
        assert_eq!(trigger.device_id(), Some("climate-1"));
        assert!(trigger.is_device_driven());

        let time: Trigger =
            serde_json::from_str(r#"{"type":"time","hour":8,"minute":30}"#).unwrap();
        assert_eq!(
            time,
            Trigger::Time {
                hour: 8,
                minute: 30,
                days: vec![]
            }
        );
        assert!(!time.is_device_driven());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad_time = Trigger::Time {
            hour: 24,
            minute: 0,
            days: vec![],
        };
        assert!(bad_time.validate().is_err());

        let bad_day = Trigger::Time {
            hour: 7,
            minute: 0,
            days: vec![1, 7],
        };
        assert!(bad_day.validate().is_err());

        let bad_fence = Trigger::Geofence {
            region: GeofenceRegion {
                name: "Home".to_string(),
                latitude: 52.0,
                longitude: 13.0,
                radius_meters: 0.0,
            },
            direction: GeofenceDirection::Enter,
        };
        assert!(bad_fence.validate().is_err());

        assert!(Trigger::GasAlarm {
            device_id: "gas-1".to_string()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_apply_update_keeps_run_state() {
        let mut automation = Automation::from_request(CreateAutomationRequest {
            name: "Night light".to_string(),
            enabled: true,
            icon: None,
            color: None,
            trigger: Trigger::Time {
                hour: 22,
                minute: 0,
                days: vec![],
            },
            actions: vec![],
        });
        automation.execution_count = 4;

        automation.apply_update(UpdateAutomationRequest {
            name: Some("Late light".to_string()),
            icon: Some(Some("moon".to_string())),
            ..Default::default()
        });

        assert_eq!(automation.name, "Late light");
        assert_eq!(automation.icon.as_deref(), Some("moon"));
        assert_eq!(automation.execution_count, 4);
    }
}
