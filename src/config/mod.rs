mod settings;

pub use settings::{Config, ConfigError, ExportConfig, MonitorConfig, PeerConfig, EXAMPLE_CONFIG};
