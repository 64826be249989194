//! Device layer for the home dashboard
//!
//! Keeps the set of known devices with their latest polled state, tracks the
//! user's position against geofences, and sends control commands to devices.

pub mod device;
pub mod dispatcher;
pub mod error;
pub mod location;
pub mod persistence;
pub mod registry;

pub use device::{
    Device, DeviceKind, DeviceSnapshot, GasReading, GasSeverity, LedState, SensorReading,
    Transport,
};
pub use dispatcher::{LedCommand, UdpDispatcher};
pub use error::DeviceError;
pub use location::{GeofenceEvent, GeofenceRegion, LocationTracker};
pub use registry::{DeviceRegistry, RegistryEvent};
