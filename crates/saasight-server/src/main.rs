//! saasight MCP server
//!
//! Answers plain-English SaaS business questions over MCP: the question is
//! translated to SQL (language model, with a pattern-matcher fallback),
//! checked by the read-only safety gate, run against DuckDB and summarized.

use std::sync::Arc;

use rust_mcp_sdk::mcp_server::{hyper_server, HyperServerOptions};
use saasight_ask::{AskPipeline, Metrics};
use saasight_duck::seed;
use saasight_duck::DuckStore;
use tracing::{info, warn};

mod config;
mod logging;
mod mcp;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Secrets first, so config overrides can come from .env too
    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("SAASIGHT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;
    config.apply_logging_env();
    logging::init().map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(config = %config_path, "Configuration loaded");

    let store = Arc::new(DuckStore::open(&config.database.path)?);
    info!(path = %config.database.path.display(), "Database opened");

    if config.database.seed_on_start {
        match seed::seed_if_empty(&store, &config.database.seed)? {
            Some(report) => info!(?report, "Empty database seeded with demo data"),
            None => info!("Existing data kept"),
        }
    }

    let api_key = match Config::get_openai_api_key() {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "Language model disabled");
            None
        }
    };
    let pipeline = AskPipeline::from_config(&config.model_config(api_key), store.clone())
        .with_metrics(Metrics::new()?);

    let handler = mcp::SaasightHandler::new(Arc::new(pipeline), store)
        .with_seed_options(config.database.seed.clone());
    let server_info = mcp::SaasightHandler::server_info();

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting saasight MCP server (SSE enabled)"
    );

    let server = hyper_server::create_server(
        server_info,
        handler,
        HyperServerOptions {
            host: config.server.host.clone(),
            port: config.server.port,
            sse_support: true,
            ..Default::default()
        },
    );

    server.start().await?;

    Ok(())
}
