//! Configuration management

use std::time::Duration;

use anyhow::{Context, Result};

use crate::solver::SolverSettings;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. "0.0.0.0:8080"
    pub bind_addr: String,

    /// Solver wall-clock limit in milliseconds
    pub time_limit_ms: u64,

    /// Emit the search trace at debug level
    pub log_search: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let time_limit_ms = match std::env::var("SOLVER_TIME_LIMIT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("SOLVER_TIME_LIMIT_MS must be an integer number of milliseconds")?,
            Err(_) => 1000,
        };

        let log_search = std::env::var("SOLVER_LOG_SEARCH_ENABLED")
            .map(|raw| raw.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            time_limit_ms,
            log_search,
        })
    }

    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            time_limit: Duration::from_millis(self.time_limit_ms),
            log_search: self.log_search,
        }
    }
}
