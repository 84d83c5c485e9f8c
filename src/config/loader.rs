use crate::config::Config;
use dotenv::dotenv;
use log::info;
use std::env;

pub const CONFIG_PATH_VAR: &str = "DEPLOY_FORGE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Reads `.env`, then the TOML target configuration. `BIND_ADDRESS` wins over
/// the file's `server.bind_address`.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    dotenv().ok();

    let config_path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("Loading configuration from {}", config_path);

    let mut config = Config::load(&config_path)?;
    if let Ok(bind_address) = env::var("BIND_ADDRESS") {
        config.server.bind_address = bind_address;
    }

    info!("Loaded {} deploy target(s)", config.targets.len());
    Ok(config)
}
