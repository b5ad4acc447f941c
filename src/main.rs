mod agent;
mod config;
mod error;
mod extract;
mod gemini;
mod schemas;
mod search;
mod server;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::MarketingAgent;
use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` never overrides variables already set in the process.
    let dotenv = dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Marketing Analysis API v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }
    tracing::debug!(
        "Configuration loaded: model={}, environment={}, google_key={}, serpapi_key={}, timeout={}s",
        config.gemini_model,
        config.environment,
        config.mask_google_key(),
        config.mask_serpapi_key(),
        config.request_timeout,
    );

    let agent = MarketingAgent::new(&config)?;
    let addr = config.bind_addr();
    let app = server::router(AppState::new(config, agent));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Marketing Analysis API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
