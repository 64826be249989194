//! On-disk store for device definitions
//!
//! Only definitions are kept. Snapshots are rebuilt from the next poll.

use crate::device::Device;
use crate::error::DeviceError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The `devices.json` file inside a data directory
#[derive(Debug, Clone)]
pub struct DeviceFile {
    path: PathBuf,
}

impl DeviceFile {
    pub const FILE_NAME: &'static str = "devices.json";

    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all definitions. A missing file is an empty list.
    pub async fn read(&self) -> Result<Vec<Device>, DeviceError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read definitions for startup, falling back to none on a bad file
    pub async fn read_or_empty(&self) -> Vec<Device> {
        match self.read().await {
            Ok(devices) => {
                tracing::info!(
                    "Restored {} device definitions from {}",
                    devices.len(),
                    self.path.display()
                );
                devices
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable device file {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Replace the file contents, ordered by device ID
    pub async fn write(&self, devices: &[Device]) -> Result<(), DeviceError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let mut sorted: Vec<&Device> = devices.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        let bytes = serde_json::to_vec_pretty(&sorted)?;

        // A reader never sees a half-written file
        let staging = self.path.with_extension("json.partial");
        fs::write(&staging, bytes).await?;
        fs::rename(&staging, &self.path).await?;

        tracing::debug!("Wrote {} device definitions", sorted.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_dir_and_orders_by_id() {
        let dir = TempDir::new().unwrap();
        let file = DeviceFile::in_dir(&dir.path().join("state"));
        let strip = Device::new("led-1", "Desk strip", DeviceKind::Led)
            .with_address("192.168.1.40:4210".parse().unwrap());
        let gas = Device::new("gas-1", "Kitchen", DeviceKind::Gas);

        file.write(&[strip.clone(), gas.clone()]).await.unwrap();

        assert_eq!(file.read().await.unwrap(), vec![gas, strip]);
        assert!(!file.path().with_extension("json.partial").exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let file = DeviceFile::in_dir(dir.path());
        assert!(file.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error_but_startup_continues() {
        let dir = TempDir::new().unwrap();
        let file = DeviceFile::in_dir(dir.path());
        fs::write(file.path(), "[{\"id\": 3}").await.unwrap();

        assert!(matches!(file.read().await, Err(DeviceError::Json(_))));
        assert!(file.read_or_empty().await.is_empty());
    }
}
