//! Tutor agent server
//!
//! Entry point: loads configuration, installs tracing, and serves HTTP.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::{info, warn};

use tutor_agent::config::{AppConfig, load_llm_settings};
use tutor_agent::{server, telemetry};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    telemetry::init();

    let config = AppConfig::load()?;
    info!(
        port = config.server.port,
        host = %config.server.host,
        "Configuration loaded"
    );

    let settings = match load_llm_settings() {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Invalid model provider configuration");
            None
        }
    };

    server::start_server(Arc::new(config), settings).await
}
