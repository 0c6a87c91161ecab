//! Fieldline scheduler - multi-day planning engine
//!
//! Reads a planning snapshot, assigns pending jobs to technicians, packs
//! multi-day routes through the optimisation service, and writes ETAs back
//! through the data interface.

mod cli;
mod config;
mod data;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::data::memory::InMemoryData;
use crate::services::availability::WorkdayCalendar;
use crate::services::cycle::PlanningCycle;
use crate::services::fallback::FallbackOptimiser;
use crate::services::optimiser_client::{Optimiser, OptimiserClient};
use crate::services::travel::{
    HaversineTravelProvider, MatrixTravelProvider, TravelTimeProvider,
};
use crate::types::PlanningSnapshot;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    dotenvy::dotenv().ok();

    let config = config::Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info,fieldline_scheduler=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        cli::Command::Plan { snapshot } => run_plan(&config, &snapshot).await,
        cli::Command::HealthCheck => health_check(&config).await,
    }
}

async fn run_plan(config: &config::Config, snapshot_path: &std::path::Path) -> Result<()> {
    info!("Starting Fieldline scheduler...");

    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("failed to read snapshot {}", snapshot_path.display()))?;
    let snapshot: PlanningSnapshot =
        serde_json::from_str(&raw).context("snapshot is not valid JSON")?;
    info!(
        technicians = snapshot.technicians.len(),
        jobs = snapshot.jobs.len(),
        "snapshot loaded"
    );

    let data = InMemoryData::from_snapshot(&snapshot);

    let travel: Box<dyn TravelTimeProvider> = if snapshot.travel_times.is_empty() {
        warn!("snapshot carries no travel matrix, using the haversine estimate");
        Box::new(HaversineTravelProvider::with_floor(config.min_travel_seconds))
    } else {
        Box::new(MatrixTravelProvider::from_entries(&snapshot.travel_times))
    };

    let calendar = WorkdayCalendar::new(
        snapshot.planning_day,
        snapshot.workday_start,
        snapshot.workday_end,
        snapshot.unavailabilities.clone(),
    );

    // Prefer the optimisation service; fall back to the in-process
    // heuristic when it is unreachable.
    let client = OptimiserClient::new(config.optimiser_url.clone(), config.optimiser_timeout());
    let optimiser: Box<dyn Optimiser> = match client.health().await {
        Ok(()) => {
            info!(url = %config.optimiser_url, "optimisation service available");
            Box::new(client)
        }
        Err(err) => {
            warn!(url = %config.optimiser_url, %err, "optimisation service unreachable, using in-process fallback");
            Box::new(FallbackOptimiser {
                min_travel_seconds: config.min_travel_seconds,
            })
        }
    };

    let cycle = PlanningCycle {
        data: &data,
        travel: travel.as_ref(),
        availability: &calendar,
        optimiser: optimiser.as_ref(),
        max_planning_days: config.max_planning_days,
    };
    let outcome = cycle.run().await.context("planning cycle failed")?;

    let with_etas = data
        .jobs()
        .iter()
        .filter(|job| job.estimated_sched.is_some())
        .count();
    info!(jobs_with_etas = with_etas, "cycle complete");

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn health_check(config: &config::Config) -> Result<()> {
    let client = OptimiserClient::new(
        config.optimiser_url.clone(),
        std::time::Duration::from_secs(5),
    );
    client
        .health()
        .await
        .context("optimisation service health check failed")?;
    println!("ok");
    Ok(())
}
