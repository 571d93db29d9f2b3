//! Player configuration
//!
//! The backend section names the host that serves recordings and the port of
//! each storage location. Timeouts bound the two playback stages.

use crate::types::StorageLocation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Backend host and per-location ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// URL scheme used for backend requests (`http` or `https`)
    pub scheme: String,
    /// Base host name or address
    pub host: String,
    /// Port of the device stream gateway
    pub device_port: u16,
    /// Port of the storage server
    pub storage_port: u16,
    /// Port of the download server
    pub download_port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            device_port: 6604,
            storage_port: 6611,
            download_port: 6609,
        }
    }
}

impl BackendConfig {
    /// Port serving the given storage location
    pub fn port_for(&self, location: StorageLocation) -> u16 {
        match location {
            StorageLocation::Device => self.device_port,
            StorageLocation::Storage => self.storage_port,
            StorageLocation::Download => self.download_port,
        }
    }

    /// `scheme://host:port` for a location
    pub fn origin(&self, location: StorageLocation) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port_for(location))
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Backend endpoints
    pub backend: BackendConfig,
    /// Budget of the segmented MP4 stage in milliseconds
    pub segmented_timeout_ms: u64,
    /// Budget of the native fallback stage in milliseconds
    pub native_timeout_ms: u64,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// HEVC codec strings tried after a track's own codec string
    pub hevc_fallback_codecs: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            segmented_timeout_ms: 15_000,
            native_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            hevc_fallback_codecs: vec![
                "hvc1.1.6.L93.B0".to_string(),
                "hev1.1.6.L93.B0".to_string(),
                "hvc1.1.6.L120.90".to_string(),
                "hev1.1.6.L120.90".to_string(),
                "hvc1".to_string(),
                "hev1".to_string(),
            ],
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the configuration for unusable values
    pub fn validate(&self) -> Result<()> {
        let backend = &self.backend;
        if backend.host.trim().is_empty() {
            return Err(Error::InvalidConfig("backend host is empty".into()));
        }
        if !matches!(backend.scheme.as_str(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "unsupported backend scheme '{}'",
                backend.scheme
            )));
        }

        let ports = [backend.device_port, backend.storage_port, backend.download_port];
        if ports.contains(&0) {
            return Err(Error::InvalidConfig("backend ports must be non-zero".into()));
        }
        if ports[0] == ports[1] || ports[1] == ports[2] || ports[0] == ports[2] {
            return Err(Error::InvalidConfig(
                "device, storage and download ports must differ".into(),
            ));
        }

        if self.segmented_timeout_ms == 0 || self.native_timeout_ms == 0 {
            return Err(Error::InvalidConfig("stage timeouts must be non-zero".into()));
        }

        Ok(())
    }

    pub fn segmented_timeout(&self) -> Duration {
        Duration::from_millis(self.segmented_timeout_ms)
    }

    pub fn native_timeout(&self) -> Duration {
        Duration::from_millis(self.native_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
