//! CLI argument parsing for the fieldline-scheduler binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fieldline-scheduler", about = "Fieldline multi-day scheduling engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one planning cycle over a snapshot file
    Plan {
        /// Path to a planning snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Probe the optimisation service's /health endpoint
    HealthCheck,
}
