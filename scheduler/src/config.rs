//! Configuration management

use anyhow::{Context, Result};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the optimisation service
    pub optimiser_url: String,

    /// Solver wall-clock limit in milliseconds (used to size the request
    /// timeout)
    pub solver_time_limit_ms: u64,

    /// Planning horizon in days
    pub max_planning_days: u32,

    /// Travel floor for the fallback heuristic, in seconds
    pub min_travel_seconds: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let optimiser_url = std::env::var("OPTIMISER_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let solver_time_limit_ms = match std::env::var("SOLVER_TIME_LIMIT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("SOLVER_TIME_LIMIT_MS must be an integer number of milliseconds")?,
            Err(_) => 1000,
        };

        let max_planning_days = match std::env::var("MAX_PLANNING_DAYS") {
            Ok(raw) => raw
                .parse::<u32>()
                .context("MAX_PLANNING_DAYS must be an integer number of days")?,
            Err(_) => 14,
        };

        let min_travel_seconds = match std::env::var("MIN_TRAVEL_SECONDS") {
            Ok(raw) => raw
                .parse::<i64>()
                .context("MIN_TRAVEL_SECONDS must be an integer number of seconds")?,
            Err(_) => 300,
        };

        Ok(Self {
            optimiser_url,
            solver_time_limit_ms,
            max_planning_days,
            min_travel_seconds,
        })
    }

    /// HTTP timeout for optimiser calls: the solver's own limit plus a
    /// generous transport margin.
    pub fn optimiser_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.solver_time_limit_ms + 5_000)
    }
}
