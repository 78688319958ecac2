use std::path::PathBuf;

use libtether_core::{load_config, TetherConfig, TetherError};
use tracing::debug;

use crate::cli::Cli;

/// Resolved configuration for one invocation
pub struct TetherContext {
    pub config: TetherConfig,
}

impl TetherContext {
    /// Load the config file (defaults if absent) and apply CLI overrides
    pub fn resolve(cli: &Cli) -> Result<Self, TetherError> {
        let config_path = cli.config.clone().unwrap_or_else(default_config_path);

        let mut config = match load_config(&config_path)? {
            Some(config) => {
                debug!(path = %config_path.display(), "loaded config");
                config
            }
            None if cli.config.is_some() => {
                return Err(TetherError::InvalidConfig(format!(
                    "config file not found: {}",
                    config_path.display()
                )));
            }
            None => TetherConfig::default(),
        };

        if let Some(transport) = cli.transport {
            config.transport = transport;
        }
        if let Some(ref host) = cli.host {
            config.host = host.clone();
        }
        config.validate()?;

        Ok(Self { config })
    }
}

/// `$XDG_CONFIG_HOME/tether/config.toml`, else `~/.config/tether/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join("tether").join("config.toml");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("tether")
            .join("config.toml");
    }
    PathBuf::from("tether.toml")
}
