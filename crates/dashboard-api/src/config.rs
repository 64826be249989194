//! Server configuration from the environment

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DEVICE_COMMAND_PORT: u16 = 4210;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `devices.json` and the automation blobs
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// UDP port LED controllers listen on, used when a device is registered
    /// with a bare IP
    pub device_command_port: u16,
}

impl ServerConfig {
    /// Read `DATA_DIR`, `BIND_ADDR` and `DEVICE_COMMAND_PORT`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let data_dir = lookup("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("invalid BIND_ADDR '{bind_addr}'"))?;

        let device_command_port = match lookup("DEVICE_COMMAND_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("invalid DEVICE_COMMAND_PORT '{port}'"))?,
            None => DEFAULT_DEVICE_COMMAND_PORT,
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            bind_addr,
            device_command_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.device_command_port, 4210);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATA_DIR", "/var/lib/dashboard"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("DEVICE_COMMAND_PORT", "5000"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/dashboard"));
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.device_command_port, 5000);
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("BIND_ADDR"));
        assert!(config(&[("DEVICE_COMMAND_PORT", "70000")]).is_err());
    }
}
