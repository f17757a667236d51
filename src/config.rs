use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the format toggle obtains the text it transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTogglePolicy {
    /// Transform the payload cached from the last fetch
    #[default]
    Local,
    /// Re-read the node from the store on every flip
    Refetch,
}

/// Viewer configuration, loaded from an optional JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// ZooKeeper connect string (e.g. "localhost:2181" or "zk1:2181,zk2:2181/chroot")
    #[serde(default = "default_connect_string")]
    pub connect_string: String,

    /// Upper bound for every get/set call made by the worker
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub format_toggle: FormatTogglePolicy,

    /// Initial state of the format toggle
    #[serde(default)]
    pub format_by_default: bool,

    /// How long the worker waits for a command before checking again
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    /// Interval between health-check pings sent to the worker
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Time without a pong before the worker is considered unresponsive
    #[serde(default = "default_health_check_grace_secs")]
    pub health_check_grace_secs: u64,

    #[serde(default = "default_true")]
    pub dark_mode: bool,
}

fn default_connect_string() -> String {
    "localhost:2181".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_worker_poll_interval_ms() -> u64 {
    100
}

fn default_health_check_interval_secs() -> u64 {
    5
}

fn default_health_check_grace_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            connect_string: default_connect_string(),
            request_timeout_ms: default_request_timeout_ms(),
            format_toggle: FormatTogglePolicy::default(),
            format_by_default: false,
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
            health_check_interval_secs: default_health_check_interval_secs(),
            health_check_grace_secs: default_health_check_grace_secs(),
            dark_mode: true,
        }
    }
}

impl ViewerConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_check_grace(&self) -> Duration {
        Duration::from_secs(self.health_check_grace_secs)
    }
}
