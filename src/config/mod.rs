pub mod loader;
pub mod structs;

use std::fs;
use std::path::{Path, PathBuf};

pub use structs::{Config, ServerConfig, TargetConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config file {0} does not define any targets")]
    NoTargets(PathBuf),
}

impl Config {
    pub fn load<P: AsRef<Path>>(file_path: P) -> Result<Self, ConfigError> {
        let path = file_path.as_ref().to_path_buf();
        let config_contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&config_contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        if config.targets.is_empty() {
            return Err(ConfigError::NoTargets(path));
        }
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn target(&self, target_id: &str) -> Option<&TargetConfig> {
        self.targets.get(target_id)
    }
}
