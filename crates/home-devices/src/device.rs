//! Device definitions and live snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Device category, used by the dashboard to pick a card layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// RGB LED strip / bulb controller
    Led,
    /// Temperature and humidity sensor
    Climate,
    /// Multi-channel gas sensor
    Gas,
    Other,
}

impl Default for DeviceKind {
    fn default() -> Self {
        Self::Other
    }
}

/// How the dashboard reaches a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Udp,
    Http,
    Ble,
}

impl Default for Transport {
    fn default() -> Self {
        Self::Udp
    }
}

/// A known device, as registered by the user or a discovery source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier
    pub id: String,
    /// User-assigned friendly name
    pub name: String,
    /// Device category
    #[serde(default)]
    pub kind: DeviceKind,
    /// Transport used for commands
    #[serde(default)]
    pub transport: Transport,
    /// Network address for UDP/HTTP transports
    #[serde(default)]
    pub address: Option<SocketAddr>,
}

impl Device {
    /// Create a new device with no address
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            transport: Transport::default(),
            address: None,
        }
    }

    /// Set the network address
    #[must_use]
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// Empty snapshot for a device that has never reported
    #[must_use]
    pub fn initial_snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot::new(&self.id, &self.name)
    }
}

/// Temperature/humidity reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

/// Derived gas severity. Encoded on the wire as 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GasSeverity {
    Normal,
    Warning,
    Danger,
}

impl TryFrom<u8> for GasSeverity {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Danger),
            other => Err(format!("invalid gas severity code {other}")),
        }
    }
}

impl From<GasSeverity> for u8 {
    fn from(severity: GasSeverity) -> Self {
        match severity {
            GasSeverity::Normal => 0,
            GasSeverity::Warning => 1,
            GasSeverity::Danger => 2,
        }
    }
}

/// Gas sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasReading {
    /// Raw per-channel ADC values
    #[serde(default)]
    pub channels: Vec<u16>,
    /// Severity derived by the sensor firmware
    pub status: GasSeverity,
}

/// LED channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedState {
    pub on: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Brightness percentage (0-100)
    pub brightness: u8,
}

/// Latest cached state of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Device identifier
    pub id: String,
    /// Friendly name, copied from the definition
    #[serde(default)]
    pub name: String,
    /// Whether the last poll reached the device
    #[serde(default)]
    pub online: bool,
    /// Current on/off state
    #[serde(default)]
    pub is_on: bool,
    #[serde(default)]
    pub sensor: Option<SensorReading>,
    #[serde(default)]
    pub gas: Option<GasReading>,
    #[serde(default)]
    pub led: Option<LedState>,
    /// When the registry last accepted this snapshot
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    /// Create an offline snapshot with no readings
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            online: false,
            is_on: false,
            sensor: None,
            gas: None,
            led: None,
            updated_at: None,
        }
    }

    /// Name for log and notification messages
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Compare readings, ignoring the update timestamp
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        self.online == other.online
            && self.is_on == other.is_on
            && self.sensor == other.sensor
            && self.gas == other.gas
            && self.led == other.led
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_severity_codes() {
        let reading: GasReading =
            serde_json::from_str(r#"{"channels":[120,340],"status":1}"#).unwrap();
        assert_eq!(reading.status, GasSeverity::Warning);
        assert!(serde_json::from_str::<GasReading>(r#"{"status":7}"#).is_err());
        assert_eq!(
            serde_json::to_value(GasSeverity::Danger).unwrap(),
            serde_json::json!(2)
        );
    }

    #[test]
    fn test_same_state_ignores_timestamp() {
        let a = DeviceSnapshot::new("led-1", "Desk");
        let mut b = a.clone();
        b.updated_at = Some(Utc::now());
        assert!(a.same_state(&b));
        b.is_on = true;
        assert!(!a.same_state(&b));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(DeviceSnapshot::new("led-1", "").display_name(), "led-1");
        assert_eq!(DeviceSnapshot::new("led-1", "Desk").display_name(), "Desk");
    }
}
