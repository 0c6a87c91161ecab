//! CLI argument parsing for the fieldline-optimiser binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fieldline-optimiser", about = "Fieldline VRP optimisation service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP service (default if no subcommand given)
    Serve,
    /// Probe the running service's /health endpoint
    HealthCheck,
}
