pub mod api;
pub mod appointment; // Appointment desk
pub mod config;
pub mod core_state; // Shared state behind every handler
pub mod db;
pub mod delivery; // WhatsApp relay
pub mod models;
pub mod preview;
pub mod query;
pub mod render; // PDF layout engine
pub mod storage; // Object storage adapters
pub mod submit; // Prescription submission chain
pub mod wizard;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Process entry: load `.env`, initialize tracing, build shared state and
/// serve the API until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is normal in production.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let settings = config::Settings::from_env()?;
    let bind_addr = settings.bind_addr;
    let core = Arc::new(core_state::CoreState::from_settings(settings)?);

    let server = api::start_server(core, bind_addr).await?;
    tracing::info!(addr = %server.addr(), "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.stop().await;
    Ok(())
}
