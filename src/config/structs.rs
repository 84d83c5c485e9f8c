use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_SECRET_PREFIX: &str = "WEBHOOK_SECRET_";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub targets: HashMap<String, TargetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
}

/// One deployable application.
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub script: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            secret_prefix: default_secret_prefix(),
        }
    }
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_secret_prefix() -> String {
    DEFAULT_SECRET_PREFIX.to_string()
}
