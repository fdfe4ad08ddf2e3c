use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sbx_core::{ContainerType, DeploymentMode, ProviderKind, Result, WorkspaceError};
use sbx_provider::Provider;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::selection::preference_chain;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Holds registered providers and their last-known health, and performs
/// preference-ordered selection.
pub struct Orchestrator {
    providers: RwLock<HashMap<ProviderKind, Arc<dyn Provider>>>,
    health: RwLock<HashMap<ProviderKind, bool>>,
    probe_timeout: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_probe_timeout(DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(probe_timeout: Duration) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
            probe_timeout,
        }
    }

    /// Registration is idempotent: re-registering a kind replaces the
    /// previous provider and logs the replacement.
    pub async fn register(&self, kind: ProviderKind, provider: Arc<dyn Provider>) {
        let mut providers = self.providers.write().await;
        if providers.insert(kind, provider).is_some() {
            info!(provider = %kind, "replaced previously registered provider");
        } else {
            info!(provider = %kind, "registered provider");
        }
    }

    pub async fn is_registered(&self, kind: ProviderKind) -> bool {
        self.providers.read().await.contains_key(&kind)
    }

    /// Probes every registered provider once and refreshes the health
    /// table. A failed or timed-out probe marks the provider unhealthy but
    /// never removes its registration.
    pub async fn run_health_tick(&self) {
        let snapshot: Vec<(ProviderKind, Arc<dyn Provider>)> = self
            .providers
            .read()
            .await
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        for (kind, provider) in snapshot {
            let healthy = match tokio::time::timeout(self.probe_timeout, provider.health()).await {
                Ok(status) => status.healthy,
                Err(_) => {
                    warn!(provider = %kind, "health probe timed out");
                    false
                }
            };
            if !healthy {
                warn!(provider = %kind, "provider reported unhealthy");
            }
            self.health.write().await.insert(kind, healthy);
        }
    }

    /// Spawns the periodic health loop. The first tick runs synchronously
    /// before the task is spawned, so callers observe a seeded health table
    /// as soon as this call returns.
    pub async fn start_health_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        self.run_health_tick().await;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate first tick, already run above
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("health loop shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.run_health_tick().await;
                    }
                }
            }
        });
    }

    pub fn default_health_interval() -> Duration {
        DEFAULT_HEALTH_INTERVAL
    }

    async fn is_healthy(&self, kind: ProviderKind) -> bool {
        self.health.read().await.get(&kind).copied().unwrap_or(false)
    }

    /// Resolves a provider for the given container type/deployment mode.
    /// An explicit `requested` kind must be registered and healthy or this
    /// fails immediately; otherwise the documented preference chain is
    /// walked in order and the first healthy entry wins.
    pub async fn select_provider(
        &self,
        container_type: ContainerType,
        deployment_mode: DeploymentMode,
        requested: Option<ProviderKind>,
    ) -> Result<Arc<dyn Provider>> {
        if let Some(kind) = requested {
            if !self.is_registered(kind).await {
                return Err(WorkspaceError::ProviderNotRegistered(kind.to_string()));
            }
            if !self.is_healthy(kind).await {
                return Err(WorkspaceError::ProviderUnhealthy(kind.to_string()));
            }
            return Ok(self.providers.read().await.get(&kind).unwrap().clone());
        }

        for kind in preference_chain(container_type, deployment_mode) {
            if self.is_registered(*kind).await && self.is_healthy(*kind).await {
                return Ok(self.providers.read().await.get(kind).unwrap().clone());
            }
        }

        Err(WorkspaceError::NoHealthyProviders {
            container_type: format!("{container_type:?}").to_lowercase(),
            deployment_mode: format!("{deployment_mode:?}").to_lowercase(),
        })
    }

    /// Identical to [`Orchestrator::select_provider`]: an explicit unhealthy
    /// ask already short-circuits there, so this is not a distinct code
    /// path. Kept as a separately named entry point for callers that want
    /// to express fallback semantics explicitly.
    pub async fn select_provider_with_fallback(
        &self,
        container_type: ContainerType,
        deployment_mode: DeploymentMode,
        requested: Option<ProviderKind>,
    ) -> Result<Arc<dyn Provider>> {
        self.select_provider(container_type, deployment_mode, requested).await
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
