use deploy_forge::{config, http};
use log::info;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();
    info!("Starting Deploy Forge...");

    let config = config::loader::load_config()?;

    http::server::start(config).await?;

    Ok(())
}
