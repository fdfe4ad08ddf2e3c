//! Expired-workspace sweeper and resource-usage alarm.

use std::sync::Arc;
use std::time::Duration;

use sbx_core::{Store, WorkspaceStatus};
use sbx_orchestrator::Orchestrator;
use sbx_provider::is_already_gone;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);
pub const DESTROY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

pub struct CleanupJob {
    store: Arc<dyn Store>,
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    max_concurrent: usize,
    alert_threshold: f64,
    cancel: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CleanupJob {
    pub fn new(store: Arc<dyn Store>, orchestrator: Arc<Orchestrator>, max_concurrent: usize) -> Self {
        Self {
            store,
            orchestrator,
            interval: DEFAULT_INTERVAL,
            max_concurrent,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    /// Idempotent: a second `start` on an already-running job is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }

        let this = self.clone();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => return,
                    _ = ticker.tick() => this.run_cycle().await,
                }
            }
        }));
    }

    /// Idempotent: waits for any in-flight cycle to finish before returning.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.take() {
            let _ = task.await;
        }
    }

    pub async fn run_cycle(&self) {
        self.sweep_expired().await;
        self.check_usage().await;
    }

    async fn sweep_expired(&self) {
        let expired = match self.store.list_expired().await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "listing expired workspaces failed");
                return;
            }
        };

        for mut workspace in expired {
            if let (Some(kind), Some(container_id)) = (workspace.provider, workspace.provider_container_id.clone()) {
                match self.orchestrator.select_provider(workspace.container_type, workspace.deployment_mode, Some(kind)).await {
                    Ok(provider) => {
                        let destroy = tokio::time::timeout(DESTROY_TIMEOUT, provider.destroy(&container_id)).await;
                        match destroy {
                            Ok(Ok(())) => {}
                            Ok(Err(err)) if is_already_gone(&err) => {}
                            Ok(Err(err)) => warn!(workspace_id = %workspace.id, error = %err, "expired workspace teardown failed"),
                            Err(_) => warn!(workspace_id = %workspace.id, "expired workspace teardown timed out"),
                        }
                    }
                    Err(err) => warn!(workspace_id = %workspace.id, error = %err, "no provider available for expired workspace teardown"),
                }
            }

            if let Err(err) = workspace.transition(WorkspaceStatus::Stopped) {
                warn!(workspace_id = %workspace.id, error = %err, "could not transition expired workspace to stopped");
                continue;
            }
            if let Err(err) = self.store.update(&workspace).await {
                warn!(workspace_id = %workspace.id, error = %err, "status update for expired workspace failed");
            }
        }
    }

    async fn check_usage(&self) {
        if self.max_concurrent == 0 {
            return;
        }
        let active = match self.store.count_active().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "counting active workspaces failed");
                return;
            }
        };
        let usage = active as f64 / self.max_concurrent as f64;
        if usage >= 1.0 {
            error!(usage, active, max_concurrent = self.max_concurrent, "workspace capacity at or over limit");
        } else if usage >= self.alert_threshold {
            warn!(usage, active, max_concurrent = self.max_concurrent, "workspace capacity approaching limit");
        } else {
            info!(usage, active, "workspace capacity nominal");
        }
    }
}
