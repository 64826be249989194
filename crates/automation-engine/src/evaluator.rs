//! Trigger evaluator for automations
//!
//! Decides whether an automation should fire right now. Evaluation only reads
//! the context it is given and never performs I/O.

use crate::model::{Automation, SensorMetric, Trigger};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc};
use home_devices::{DeviceSnapshot, GasSeverity};

/// Inputs for one evaluation pass
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Absolute time, used for cooldowns
    pub now: DateTime<Utc>,
    /// Local wall-clock time, used for time-of-day triggers
    pub wall_clock: NaiveDateTime,
    /// Device whose snapshot changed, for device-driven triggers
    pub device: Option<&'a DeviceSnapshot>,
}

impl EvalContext<'static> {
    /// Context for the current local time
    pub fn now() -> Self {
        let local = Local::now();
        Self::at(local.with_timezone(&Utc), local.naive_local())
    }

    /// Context for an explicit instant
    pub fn at(now: DateTime<Utc>, wall_clock: NaiveDateTime) -> Self {
        Self {
            now,
            wall_clock,
            device: None,
        }
    }
}

impl<'a> EvalContext<'a> {
    /// Attach the device under evaluation
    pub fn with_device<'b>(self, device: &'b DeviceSnapshot) -> EvalContext<'b> {
        EvalContext {
            now: self.now,
            wall_clock: self.wall_clock,
            device: Some(device),
        }
    }
}

/// Evaluator for automation triggers
pub struct TriggerEvaluator {
    cooldown: chrono::Duration,
}

impl TriggerEvaluator {
    /// Create an evaluator that suppresses re-firing within `cooldown`
    pub fn new(cooldown: std::time::Duration) -> Self {
        Self {
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Whether the automation fired less than one cooldown ago
    pub fn in_cooldown(&self, automation: &Automation, now: DateTime<Utc>) -> bool {
        automation
            .last_triggered_at
            .is_some_and(|last| now.signed_duration_since(last) < self.cooldown)
    }

    /// Decide whether a polled trigger fires.
    ///
    /// Geofence triggers never fire here; see [`Self::geofence_matches`].
    pub fn should_fire(&self, automation: &Automation, ctx: &EvalContext<'_>) -> bool {
        if !automation.enabled {
            return false;
        }
        if matches!(automation.trigger, Trigger::Geofence { .. }) {
            return false;
        }
        if self.in_cooldown(automation, ctx.now) {
            tracing::trace!(
                "Automation '{}' is cooling down, skipping",
                automation.name
            );
            return false;
        }

        match &automation.trigger {
            Trigger::Time { hour, minute, days } => {
                evaluate_time(*hour, *minute, days, &ctx.wall_clock)
            }
            Trigger::SensorThreshold {
                device_id,
                metric,
                operator,
                threshold,
            } => {
                let Some(reading) = bound_device(device_id, ctx).and_then(|d| d.sensor) else {
                    return false;
                };
                let value = match metric {
                    SensorMetric::Temperature => reading.temperature,
                    SensorMetric::Humidity => reading.humidity,
                };
                operator.compare(value, *threshold)
            }
            Trigger::GasAlarm { device_id } => bound_device(device_id, ctx)
                .and_then(|d| d.gas.as_ref())
                // Only the warning level fires, danger does not
                .is_some_and(|gas| gas.status == GasSeverity::Warning),
            Trigger::DeviceState { .. } | Trigger::Solar { .. } | Trigger::Geofence { .. } => {
                false
            }
        }
    }

    /// Decide whether a reported geofence crossing fires the automation
    pub fn geofence_matches(&self, automation: &Automation, did_enter: bool) -> bool {
        match &automation.trigger {
            Trigger::Geofence { direction, .. } => {
                automation.enabled && direction.matches(did_enter)
            }
            _ => false,
        }
    }
}

/// Exact hour/minute match plus optional weekday filter
fn evaluate_time(hour: u8, minute: u8, days: &[u8], wall_clock: &NaiveDateTime) -> bool {
    if wall_clock.hour() != u32::from(hour) || wall_clock.minute() != u32::from(minute) {
        return false;
    }
    if days.is_empty() {
        return true; // Empty means every day
    }
    let today = wall_clock.weekday().num_days_from_sunday() as u8;
    days.contains(&today)
}

/// The device under evaluation, if it is the one the trigger is bound to
fn bound_device<'a>(device_id: &str, ctx: &EvalContext<'a>) -> Option<&'a DeviceSnapshot> {
    ctx.device.filter(|d| d.id == device_id)
}
