//! Fieldline optimiser - VRP optimisation service
//!
//! Stateless HTTP service that solves daily routing problems for the
//! scheduling engine.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldline_optimiser::config::Config;
use fieldline_optimiser::service::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    match cli.command {
        Some(cli::Command::HealthCheck) => health_check(&config).await,
        Some(cli::Command::Serve) | None => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info,fieldline_optimiser=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Fieldline optimiser...");
    info!(
        time_limit_ms = config.time_limit_ms,
        log_search = config.log_search,
        "Configuration loaded"
    );

    let state = Arc::new(AppState {
        settings: config.solver_settings(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, service::router(state))
        .await
        .context("server error")?;

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let port = config
        .bind_addr
        .rsplit(':')
        .next()
        .context("BIND_ADDR is missing a port")?;
    let url = format!("http://127.0.0.1:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("health check request to {url} failed"))?;
    anyhow::ensure!(
        response.status().is_success(),
        "optimiser returned status {}",
        response.status()
    );

    println!("ok");
    Ok(())
}
