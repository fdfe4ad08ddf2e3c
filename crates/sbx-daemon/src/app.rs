use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use sbx_cleanup::CleanupJob;
use sbx_core::{ContainerType, DeploymentMode, InMemoryStore, ProviderKind, Store};
use sbx_orchestrator::Orchestrator;
use sbx_pool::WarmPool;
use sbx_provider::{E2bProvider, FirecrackerProvider, GvisorProvider, Provider};
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;

pub struct Engine {
    pub orchestrator: Arc<Orchestrator>,
    pub pool: Arc<WarmPool>,
    pub store: Arc<dyn Store>,
    pub cleanup: Arc<CleanupJob>,
    pub cancel: CancellationToken,
}

fn parse_provider_kind(name: &str) -> anyhow::Result<ProviderKind> {
    match name {
        "firecracker" => Ok(ProviderKind::Firecracker),
        "gvisor" => Ok(ProviderKind::Gvisor),
        "e2b" => Ok(ProviderKind::E2b),
        other => bail!("unknown provider in config: '{other}'"),
    }
}

fn build_provider(kind: ProviderKind) -> Arc<dyn Provider> {
    match kind {
        ProviderKind::Firecracker => Arc::new(FirecrackerProvider::new()),
        ProviderKind::Gvisor => Arc::new(GvisorProvider::new()),
        ProviderKind::E2b => Arc::new(E2bProvider::new()),
    }
}

/// Builds the orchestrator (with every configured provider registered and
/// health-checked once), the warm pool (filled against the auto-selected
/// `agent_workspace`/`self_hosted` provider), the in-memory store, and the
/// cleanup job. Does not start the health loop or cleanup job — callers
/// decide that based on the subcommand.
pub async fn build_engine(config: &DaemonConfig) -> anyhow::Result<Engine> {
    let orchestrator = Arc::new(Orchestrator::new());
    for name in &config.providers {
        let kind = parse_provider_kind(name)?;
        orchestrator.register(kind, build_provider(kind)).await;
    }
    orchestrator.run_health_tick().await;

    let pool_provider = orchestrator
        .select_provider(ContainerType::AgentWorkspace, DeploymentMode::SelfHosted, None)
        .await
        .context("no healthy provider available to seed the warm pool")?;
    let pool = WarmPool::new(pool_provider);
    pool.start(config.warm_pool_target).await;

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let cleanup = Arc::new(
        CleanupJob::new(store.clone(), orchestrator.clone(), config.max_concurrent)
            .with_interval(Duration::from_secs(config.cleanup_interval_secs))
            .with_alert_threshold(config.alert_threshold),
    );

    Ok(Engine { orchestrator, pool, store, cleanup, cancel: CancellationToken::new() })
}

impl Engine {
    pub async fn run_until_shutdown(&self) -> anyhow::Result<()> {
        self.orchestrator.clone().start_health_loop(Orchestrator::default_health_interval(), self.cancel.clone()).await;
        self.cleanup.start().await;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
            }
            _ = self.cancel.cancelled() => {}
        }

        self.cancel.cancel();
        self.cleanup.stop().await;
        self.pool.stop().await;
        Ok(())
    }
}
