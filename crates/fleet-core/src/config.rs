//! fleetd.toml configuration parser.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading `fleetd.toml` or `cluster.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration. Every field has a default so an empty file
/// (or no file at all) yields a usable single-node setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the stats endpoint listens on.
    pub listen: SocketAddr,
    /// This node's ip as seen by peers. Detected when unset.
    pub node_ip: Option<String>,
    /// Path to the cluster descriptor JSON.
    pub descriptor: PathBuf,
    /// Directory for the election audit database.
    pub data_dir: PathBuf,
    /// Polling cycle period (e.g. "30s").
    pub poll_interval: String,
    /// Upper bound on any single peer or provider call (e.g. "5s").
    pub request_timeout: String,
    /// How long an elected action may stay in flight before the epoch is
    /// closed without provider confirmation (e.g. "10m").
    pub settle_timeout: String,
    /// Upper bound on the scaling action command (e.g. "2m").
    pub dispatch_timeout: String,
    /// Static peers as `ip:port`.
    pub peers: Vec<String>,
    /// Port used to reach peers discovered through the provider.
    pub peer_port: u16,
    /// External commands.
    pub commands: CommandsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Program plus leading args; the action name is appended.
    pub action: Vec<String>,
    /// Command printing a JSON array of `{ip, status}` instances.
    pub instances: Option<Vec<String>>,
    /// Command exiting 0 while the pool is mid-scaling.
    pub scaling_status: Option<Vec<String>>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            action: vec!["server-cloud-elections".to_string()],
            instances: None,
            scaling_status: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8642)),
            node_ip: None,
            descriptor: PathBuf::from("/etc/fleetgrid/cluster.json"),
            data_dir: PathBuf::from("/var/lib/fleetgrid"),
            poll_interval: "30s".to_string(),
            request_timeout: "5s".to_string(),
            settle_timeout: "10m".to_string(),
            dispatch_timeout: "2m".to_string(),
            peers: Vec::new(),
            peer_port: 8642,
            commands: CommandsConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would otherwise surface as a panic or a busy loop.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("poll_interval", &self.poll_interval),
            ("request_timeout", &self.request_timeout),
            ("settle_timeout", &self.settle_timeout),
            ("dispatch_timeout", &self.dispatch_timeout),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be a positive duration, got {value:?}"
                    )));
                }
            }
        }
        if self.commands.action.is_empty() {
            return Err(ConfigError::Invalid("commands.action is empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.poll_interval).unwrap_or(Duration::from_secs(30))
    }

    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn settle_timeout(&self) -> Duration {
        parse_duration(&self.settle_timeout).unwrap_or(Duration::from_secs(600))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        parse_duration(&self.dispatch_timeout).unwrap_or(Duration::from_secs(120))
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
