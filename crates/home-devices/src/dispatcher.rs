//! UDP command dispatcher for LED controllers
//!
//! Commands are single JSON datagrams. Controllers do not acknowledge them,
//! so a successful send only means the packet left this host.

use crate::device::Transport;
use crate::error::DeviceError;
use crate::registry::DeviceRegistry;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Command payload understood by the LED firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LedCommand {
    /// Switch output on or off
    Power { on: bool },
    /// Set RGB color and brightness (0-100)
    Color {
        r: u8,
        g: u8,
        b: u8,
        brightness: u8,
    },
}

impl LedCommand {
    /// Encode as a datagram payload
    pub fn encode(&self) -> Result<Vec<u8>, DeviceError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Sends [`LedCommand`]s to devices registered with a UDP address
pub struct UdpDispatcher {
    registry: Arc<DeviceRegistry>,
    socket: UdpSocket,
}

impl UdpDispatcher {
    /// Bind an ephemeral local socket
    pub async fn bind(registry: Arc<DeviceRegistry>) -> Result<Self, DeviceError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { registry, socket })
    }

    /// Send a power command
    pub async fn send_power(&self, device_id: &str, on: bool) -> Result<(), DeviceError> {
        self.send(device_id, LedCommand::Power { on }).await
    }

    /// Send a color command
    pub async fn send_color(
        &self,
        device_id: &str,
        r: u8,
        g: u8,
        b: u8,
        brightness: u8,
    ) -> Result<(), DeviceError> {
        self.send(
            device_id,
            LedCommand::Color {
                r,
                g,
                b,
                brightness: brightness.min(100),
            },
        )
        .await
    }

    async fn send(&self, device_id: &str, command: LedCommand) -> Result<(), DeviceError> {
        let device = self
            .registry
            .get_device(device_id)
            .ok_or_else(|| DeviceError::NotFound(device_id.to_string()))?;

        if device.transport != Transport::Udp {
            return Err(DeviceError::UnsupportedTransport {
                id: device.id,
                transport: device.transport,
            });
        }
        let address = device
            .address
            .ok_or_else(|| DeviceError::NoAddress(device.id.clone()))?;

        let payload = command.encode()?;
        tracing::info!("Sending {:?} to {} at {}", command, device.name, address);
        self.socket.send_to(&payload, address).await?;
        Ok(())
    }
}
