use std::path::PathBuf;

use clap::Parser;

mod cli;

use cli::{Cli, Commands};
use sbx_daemon::{app, config::DaemonConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from("sbx-daemon.toml"));
    let config = DaemonConfig::load(&config_path)?;

    match cli.command {
        Commands::Run => {
            let engine = app::build_engine(&config).await?;
            engine.run_until_shutdown().await?;
        }
        Commands::Health => {
            let engine = app::build_engine(&config).await?;
            let metrics = engine.pool.metrics().await;
            println!("warm pool: {}/{} (hits={}, misses={})", metrics.pool_size, metrics.target_size, metrics.hits, metrics.misses);
            engine.pool.stop().await;
        }
        Commands::CleanupOnce => {
            let engine = app::build_engine(&config).await?;
            engine.cleanup.run_cycle().await;
            engine.pool.stop().await;
        }
    }

    Ok(())
}
