use cairn_channel::HubConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CairnConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub hub: HubConfig,
    /// Capacity of the recent-events buffer kept by the watcher service.
    #[serde(default = "defaults::rigid_capacity")]
    pub rigid_capacity: usize,
    #[serde(default = "defaults::watchers")]
    pub watchers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn rigid_capacity() -> usize {
        64
    }

    pub fn watchers() -> usize {
        2
    }
}

impl Default for CairnConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            hub: HubConfig::default(),
            rigid_capacity: defaults::rigid_capacity(),
            watchers: defaults::watchers(),
        }
    }
}

impl CairnConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}
