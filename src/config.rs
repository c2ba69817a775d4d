//! Engine configuration
//!
//! Loaded from YAML (JSON is valid YAML, so either works). Every key is optional:
//!
//! ```yaml
//! service_directory: config/service_directory.json
//! schema_dir: config/data_format
//! store_capacity: 100
//! capture:
//!   interface: eth0
//! injection:
//!   host: 127.0.0.1
//!   protocol: tcp
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::injector::{TcpTransport, Transport, UdpTransport};
use crate::store::DEFAULT_CAPACITY;
use crate::{Result, SlateError};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlateConfig {
    /// Service directory file; `.json`/`.yaml`/`.yml` or a plain listing
    pub service_directory: PathBuf,
    /// Directory holding one schema file per service
    pub schema_dir: PathBuf,
    /// Messages retained per service
    pub store_capacity: usize,
    pub capture: CaptureConfig,
    pub injection: InjectionConfig,
}

impl Default for SlateConfig {
    fn default() -> Self {
        Self {
            service_directory: PathBuf::from("config/service_directory.json"),
            schema_dir: PathBuf::from("config/data_format"),
            store_capacity: DEFAULT_CAPACITY,
            capture: CaptureConfig::default(),
            injection: InjectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Device interface the capture command listens on
    pub interface: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { interface: "eth0".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectionConfig {
    /// Host the transport connects to (usually the local end of a tunnel)
    pub host: String,
    pub protocol: InjectionProtocol,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), protocol: InjectionProtocol::Tcp }
    }
}

impl InjectionConfig {
    /// Build the configured transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        match self.protocol {
            InjectionProtocol::Tcp => Arc::new(TcpTransport::new(self.host.clone())),
            InjectionProtocol::Udp => Arc::new(UdpTransport::new(self.host.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionProtocol {
    #[default]
    Tcp,
    Udp,
}

impl SlateConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml_ng::from_str(text).map_err(|e| SlateError::Parse {
            context: "Configuration".to_string(),
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| SlateError::file_error(path.to_path_buf(), source))?;

        let mut config = Self::from_yaml_str(&text)?;
        if let Some(base) = path.parent() {
            config.service_directory = base.join(&config.service_directory);
            config.schema_dir = base.join(&config.schema_dir);
        }

        debug!(?config, "Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.store_capacity == 0 {
            return Err(SlateError::Config { reason: "store_capacity must be at least 1".into() });
        }
        if self.capture.interface.trim().is_empty() {
            return Err(SlateError::Config { reason: "capture.interface is empty".into() });
        }
        if self.injection.host.trim().is_empty() {
            return Err(SlateError::Config { reason: "injection.host is empty".into() });
        }
        Ok(())
    }
}
