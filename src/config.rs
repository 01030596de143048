//! Camera connection configuration
//!
//! # Configuration File Format
//!
//! Connection settings load from a TOML file:
//!
//! ```toml
//! [camera]
//! host = "192.168.1.10"
//! protocol = "cola_2"          # "cola_b" for the legacy command channel
//! # control_port = 2122        # defaults to the protocol's standard port
//! # blob_port = 2114           # usually discovered via BlobTcpPortAPI
//! session_timeout_ms = 5000    # must fit the protocol's u8 seconds field
//! connect_timeout_ms = 5000
//! recv_timeout_ms = 5000
//! auto_reconnect = true
//! ```
//!
//! All fields except `host` and `protocol` have defaults, so the minimal file
//! is two lines. `CameraConfig::new` builds the same defaults in code for
//! callers that do not want a file.

use crate::cola::ProtocolVariant;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Connection parameters for one camera
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Camera hostname or IP address
    pub host: String,

    /// Command channel variant; also selects the default control port
    pub protocol: ProtocolVariant,

    /// Control channel port override (defaults to 2112 / 2122 by protocol)
    #[serde(default)]
    pub control_port: Option<u16>,

    /// Blob channel port override.
    ///
    /// When unset, ask the device via `Control::blob_port`.
    #[serde(default)]
    pub blob_port: Option<u16>,

    /// Session timeout announced to the camera during the CoLa-2 handshake.
    ///
    /// **Units**: milliseconds. **Valid range**: up to 255 000 (the wire
    /// carries whole seconds in one byte).
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_io_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Socket receive timeout in milliseconds.
    ///
    /// Bounds every blocking read, including the grabber worker's, so
    /// shutdown completes in bounded time.
    #[serde(default = "default_io_timeout_ms")]
    pub recv_timeout_ms: u64,

    /// Re-open the control session once when the camera forgets the session
    /// or the stream desynchronizes
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
}

fn default_session_timeout_ms() -> u64 {
    5000
}

fn default_io_timeout_ms() -> u64 {
    5000
}

fn default_auto_reconnect() -> bool {
    true
}

/// Largest session timeout representable on the wire (255 seconds)
const MAX_SESSION_TIMEOUT_MS: u64 = 255_000;

#[derive(Deserialize)]
struct ConfigFile {
    camera: CameraConfig,
}

impl CameraConfig {
    /// Default configuration for a host
    pub fn new(host: &str, protocol: ProtocolVariant) -> CameraConfig {
        CameraConfig {
            host: host.to_string(),
            protocol,
            control_port: None,
            blob_port: None,
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_io_timeout_ms(),
            recv_timeout_ms: default_io_timeout_ms(),
            auto_reconnect: default_auto_reconnect(),
        }
    }

    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CameraConfig> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;

        let file: ConfigFile = basic_toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        file.camera.validate()?;
        Ok(file.camera)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.session_timeout_ms > MAX_SESSION_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "session_timeout_ms must be at most {} (got {})",
                MAX_SESSION_TIMEOUT_MS, self.session_timeout_ms
            )));
        }
        Ok(())
    }

    /// Effective control channel port
    pub fn control_port(&self) -> u16 {
        self.control_port.unwrap_or_else(|| self.protocol.control_port())
    }

    /// Session timeout in whole seconds as announced on the wire
    pub fn session_timeout_secs(&self) -> u8 {
        (self.session_timeout_ms / 1000) as u8
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}
