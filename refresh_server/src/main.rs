// src/main.rs

use anyhow::Context;
use data_pipeline::PipelineConfig;
use refresh_server::handlers::RefreshState;
use refresh_server::{run_server, server_addr};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let addr = server_addr(|key| std::env::var(key).ok());

    run_server(&addr, RefreshState::from_config(config))
        .await
        .with_context(|| format!("Refresh server on {} stopped", addr))
}
