use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sbx-daemon", version, about = "Agent workspace & MCP container orchestration engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML bootstrap config (defaults to ./sbx-daemon.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the orchestration engine: registers providers, fills the warm
    /// pool, starts the health loop and cleanup job, and blocks until a
    /// shutdown signal arrives.
    Run,

    /// Print provider registration and health status, then exit.
    Health,

    /// Run a single cleanup sweep cycle and exit.
    CleanupOnce,
}
