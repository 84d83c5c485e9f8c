use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;

use crate::config::structs::Config;
use crate::deploy::SystemRunner;
use crate::http::handler::{handle_webhook, healthz, AppState};
use crate::webhook::Secrets;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook/:target_id", post(handle_webhook))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let secrets = Secrets::from_env(config.server.secret_prefix.clone());
    for target_id in config.targets.keys() {
        if secrets.secret_for(target_id).is_none() {
            warn!(
                "No secret set for target {} ({}); its deliveries will be refused",
                target_id,
                secrets.variable_name(target_id)
            );
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    info!(
        "Starting webhook server on {}",
        config.server.bind_address
    );

    let state = Arc::new(AppState::new(config, secrets, Arc::new(SystemRunner)));
    serve(listener, state).await?;

    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
