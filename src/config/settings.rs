use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::monitor::EventHandlingState;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub peer: PeerConfig,
    pub monitor: MonitorConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    /// Name advertised to other peers
    pub display_name: String,
    /// Address to accept sessions on
    pub listen: Option<SocketAddr>,
    /// Addresses probed during discovery
    pub peers: Vec<SocketAddr>,
    pub discovery_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub initial_mode: EventHandlingState,
    pub auto_connect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Default fixtures destination
    pub fixtures_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer: PeerConfig {
                display_name: "rewind-monitor".to_string(),
                listen: None,
                peers: Vec::new(),
                discovery_interval: Duration::from_millis(1000),
            },
            monitor: MonitorConfig {
                initial_mode: EventHandlingState::Playing,
                auto_connect: true,
            },
            export: ExportConfig {
                fixtures_file: PathBuf::from("fixtures.json"),
            },
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlPeerConfig {
    pub display_name: Option<String>,
    pub listen: Option<SocketAddr>,
    pub peers: Option<Vec<SocketAddr>>,
    pub discovery_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlMonitorConfig {
    pub initial_mode: Option<EventHandlingState>,
    pub auto_connect: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlExportConfig {
    pub fixtures_file: Option<PathBuf>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub peer: Option<TomlPeerConfig>,
    pub monitor: Option<TomlMonitorConfig>,
    pub export: Option<TomlExportConfig>,
}

impl Config {
    /// Load configuration from the data directory, merging with defaults.
    ///
    /// Writes the bundled example on first run. A malformed file is reported
    /// and ignored.
    pub fn load() -> Self {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        match Self::load_from(&config_file) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Using default configuration");
                Config::default()
            }
        }
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML contents on top of the defaults.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(peer) = toml_config.peer {
            if let Some(display_name) = peer.display_name {
                config.peer.display_name = display_name;
            }
            if let Some(listen) = peer.listen {
                config.peer.listen = Some(listen);
            }
            if let Some(peers) = peer.peers {
                config.peer.peers = peers;
            }
            if let Some(interval) = peer.discovery_interval_ms {
                // A zero interval would make tokio's interval panic
                config.peer.discovery_interval = Duration::from_millis(interval.max(1));
            }
        }

        if let Some(monitor) = toml_config.monitor {
            if let Some(initial_mode) = monitor.initial_mode {
                config.monitor.initial_mode = initial_mode;
            }
            if let Some(auto_connect) = monitor.auto_connect {
                config.monitor.auto_connect = auto_connect;
            }
        }

        if let Some(export) = toml_config.export {
            if let Some(fixtures_file) = export.fixtures_file {
                config.export.fixtures_file = fixtures_file;
            }
        }

        Ok(config)
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }
}
