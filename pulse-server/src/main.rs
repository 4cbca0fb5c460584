//! Control-surface entrypoint
//!
//! Binds the REST API and serves until the process is killed. The listen
//! address comes from `PULSE_ADDR`; everything else uses defaults.

use pulse_server::{create_app, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_server::logging::init_tracing("info")?;

    let config = ServerConfig::default();
    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    tokio::fs::create_dir_all(&config.results_dir).await?;

    let state = AppState::new(config);
    let addr = std::env::var("PULSE_ADDR").unwrap_or_else(|_| "127.0.0.1:5050".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "pulse control surface listening");

    axum::serve(listener, create_app(state)).await?;
    Ok(())
}
