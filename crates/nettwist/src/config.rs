//! Control plane configuration.
//!
//! Loaded from a JSON file or built in code. Every field has a default so a
//! partial file (or none at all) is valid.
//!
//! ```json
//! {
//!   "stop_poll_interval_ms": 100,
//!   "stop_timeout_ms": 5000,
//!   "tc_path": "tc",
//!   "bpf_object": "/usr/lib/nettwist/nettwist.bpf.o",
//!   "xdp_program": "xdp_main",
//!   "xdp_mode": "skb",
//!   "server": { "addr": "0.0.0.0:9007", "origin_allowed": "*" }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::xdp::XdpMode;
use crate::{Error, Result};

/// Default location of the compiled XDP object.
pub const DEFAULT_BPF_OBJECT: &str = "/usr/lib/nettwist/nettwist.bpf.o";

/// Default REST listen address.
pub const DEFAULT_SERVE_ADDR: &str = "0.0.0.0:9007";

/// Control plane settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often `stop` re-checks the mechanism, in milliseconds.
    pub stop_poll_interval_ms: u64,
    /// How long `stop` waits for the mechanism to go inactive, in milliseconds.
    pub stop_timeout_ms: u64,
    /// Name or path of the `tc` binary.
    pub tc_path: String,
    /// Path to the compiled XDP object file.
    pub bpf_object: PathBuf,
    /// Name of the XDP entry point inside the object.
    pub xdp_program: String,
    /// XDP attach mode.
    pub xdp_mode: XdpMode,
    /// REST server settings.
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stop_poll_interval_ms: 100,
            stop_timeout_ms: 5000,
            tc_path: "tc".to_string(),
            bpf_object: PathBuf::from(DEFAULT_BPF_OBJECT),
            xdp_program: "xdp_main".to_string(),
            xdp_mode: XdpMode::default(),
            server: ServerConfig::default(),
        }
    }
}

/// REST server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: String,
    /// Value of `Access-Control-Allow-Origin`.
    pub origin_allowed: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVE_ADDR.to_string(),
            origin_allowed: "*".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse the listen address.
    ///
    /// A bare `:port` (as accepted by many daemons) binds all interfaces.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = match self.addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.addr.clone(),
        };
        addr.parse()
            .map_err(|e| Error::Config(format!("server address {:?}: {e}", self.addr)))
    }
}

impl Config {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.stop_poll_interval_ms == 0 {
            return Err(Error::Config(
                "stop_poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.stop_timeout_ms < self.stop_poll_interval_ms {
            return Err(Error::Config(
                "stop_timeout_ms must not be shorter than stop_poll_interval_ms".into(),
            ));
        }
        if self.tc_path.is_empty() {
            return Err(Error::Config("tc_path must not be empty".into()));
        }
        if self.xdp_program.is_empty() {
            return Err(Error::Config("xdp_program must not be empty".into()));
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Interval between stop confirmation checks.
    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    /// Window for stop confirmation.
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Set the stop poll interval.
    pub fn with_stop_poll_interval(mut self, interval: Duration) -> Self {
        self.stop_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the `tc` binary name or path.
    pub fn with_tc_path(mut self, path: impl Into<String>) -> Self {
        self.tc_path = path.into();
        self
    }

    /// Set the XDP object path.
    pub fn with_bpf_object(mut self, path: impl Into<PathBuf>) -> Self {
        self.bpf_object = path.into();
        self
    }

    /// Set the XDP attach mode.
    pub fn with_xdp_mode(mut self, mode: XdpMode) -> Self {
        self.xdp_mode = mode;
        self
    }

    /// Set the REST listen address.
    pub fn with_serve_addr(mut self, addr: impl Into<String>) -> Self {
        self.server.addr = addr.into();
        self
    }

    /// Set the allowed CORS origin.
    pub fn with_origin_allowed(mut self, origin: impl Into<String>) -> Self {
        self.server.origin_allowed = origin.into();
        self
    }
}
