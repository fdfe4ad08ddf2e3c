//! Auto-provisioner pipeline: parse config, resolve repo
//! source, select a provider, obtain a container, persist, clone, run
//! setup, finalize. Also owns workspace teardown.

use std::sync::Arc;

use sbx_checkout::CheckoutService;
use sbx_config::{resolve_repo_source, AgentWorkspaceConfig, TaskContext};
use sbx_core::{
    ContainerType, DeploymentMode, Lifecycle, Store, Workspace, WorkspaceError, WorkspaceStatus,
};
use sbx_orchestrator::Orchestrator;
use sbx_pool::WarmPool;
use sbx_provider::{is_already_gone, CreateRequest, Provider};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of [`provision`]. Provider-selection failure is success at the
/// pipeline level — `workspace` is `None` and `degraded` is set; the
/// caller decides what to do next.
#[derive(Debug, Clone)]
pub struct ProvisionResult {
    pub workspace: Option<Workspace>,
    pub repo_url: String,
    pub branch: String,
    pub degraded: bool,
    pub error: Option<String>,
}

impl ProvisionResult {
    fn degraded(repo_url: String, branch: String, error: String) -> Self {
        Self { workspace: None, repo_url, branch, degraded: true, error: Some(error) }
    }

    fn none_requested() -> Self {
        Self { workspace: None, repo_url: String::new(), branch: String::new(), degraded: false, error: None }
    }
}

pub struct Provisioner {
    orchestrator: Arc<Orchestrator>,
    pool: Option<Arc<WarmPool>>,
    store: Arc<dyn Store>,
    checkout: CheckoutService,
}

impl Provisioner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        pool: Option<Arc<WarmPool>>,
        store: Arc<dyn Store>,
        checkout: CheckoutService,
    ) -> Self {
        Self { orchestrator, pool, store, checkout }
    }

    /// Runs the full pipeline for a single agent workspace request.
    pub async fn provision(
        &self,
        config_value: &serde_json::Value,
        deployment_mode: DeploymentMode,
        agent_session_id: Option<String>,
        task_metadata: Option<&serde_json::Value>,
        cancel: &CancellationToken,
    ) -> Result<ProvisionResult, WorkspaceError> {
        // Step 1: parse config. Missing/empty/disabled ⇒ no provisioning.
        let config = AgentWorkspaceConfig::parse(config_value)?;
        if !config.enabled {
            return Ok(ProvisionResult::none_requested());
        }

        // Step 2: resolve repo source.
        let task_context = task_metadata.and_then(TaskContext::extract);
        let config_branch = match &config.repo_source {
            sbx_config::RepoSource::Fixed { branch, .. } => branch.as_str(),
            _ => "",
        };
        let (repo_url, branch, should_checkout) =
            resolve_repo_source(&config.repo_source, config_branch, task_context.as_ref());

        // Step 3: select provider.
        let provider = match self
            .orchestrator
            .select_provider(ContainerType::AgentWorkspace, deployment_mode, None)
            .await
        {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "provider selection failed, returning degraded result");
                return Ok(ProvisionResult::degraded(repo_url, branch, err.to_string()));
            }
        };

        // Step 4: obtain container — warm pool first, then create.
        let container_id = match &self.pool {
            Some(pool) => match pool.acquire().await {
                Some(id) => id,
                None => provider.create(build_create_request(&config)).await.map_err(|err| {
                    WorkspaceError::CloneFailed { workspace_id: "unassigned".to_string(), message: err.to_string() }
                })?,
            },
            None => provider.create(build_create_request(&config)).await.map_err(|err| {
                WorkspaceError::CloneFailed { workspace_id: "unassigned".to_string(), message: err.to_string() }
            })?,
        };

        let mut workspace = Workspace::new(ContainerType::AgentWorkspace, deployment_mode, Lifecycle::Ephemeral, None)?;
        workspace.agent_session_id = agent_session_id;
        workspace.repo_url = if repo_url.is_empty() { None } else { Some(repo_url.clone()) };
        workspace.branch = if branch.is_empty() { None } else { Some(branch.clone()) };
        workspace.resource_limits = config.resource_limits.clone();
        workspace.bind_provider(provider.capabilities().kind, container_id.clone())?;

        // Step 5: persist in `creating`.
        self.store.create(&workspace).await?;

        // Step 6: clone.
        if should_checkout {
            if let Err(err) = self.checkout.clone(provider.as_ref(), &container_id, &repo_url, &branch, cancel).await {
                workspace.transition(WorkspaceStatus::Failed)?;
                self.store.update(&workspace).await?;
                if let Err(destroy_err) = provider.destroy(&container_id).await {
                    if !is_already_gone(&destroy_err) {
                        warn!(container_id = %container_id, error = %destroy_err, "teardown after clone failure also failed");
                    }
                }
                return Err(err);
            }
        }

        // Step 7: run setup commands (logged but non-fatal).
        if let Err(err) = sbx_setup::run_setup_commands(Some(provider.as_ref()), &container_id, &config.setup_commands).await {
            warn!(container_id = %container_id, error = %err, "setup failed, workspace still becomes ready");
        }

        // Step 8: finalize.
        workspace.transition(WorkspaceStatus::Ready)?;
        workspace.touch();
        self.store.update(&workspace).await?;

        info!(workspace_id = %workspace.id, "workspace provisioned");
        Ok(ProvisionResult { workspace: Some(workspace), repo_url, branch, degraded: false, error: None })
    }

    /// Tears down a workspace: missing provider is logged and the
    /// workspace is still marked stopped; provider errors are logged but
    /// never block the status update.
    pub async fn teardown(&self, workspace: &mut Option<Workspace>) -> Result<(), WorkspaceError> {
        let Some(ws) = workspace.as_mut() else {
            return Ok(());
        };

        match (ws.provider, &ws.provider_container_id) {
            (Some(kind), Some(container_id)) => {
                match self.orchestrator.select_provider(ws.container_type, ws.deployment_mode, Some(kind)).await {
                    Ok(provider) => {
                        if let Err(err) = provider.destroy(container_id).await {
                            if !is_already_gone(&err) {
                                warn!(workspace_id = %ws.id, error = %err, "teardown destroy failed, status update still proceeds");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(workspace_id = %ws.id, error = %err, "provider unavailable for teardown, marking stopped anyway");
                    }
                }
            }
            _ => {
                warn!(workspace_id = %ws.id, "no bound provider for teardown, marking stopped anyway");
            }
        }

        ws.transition(WorkspaceStatus::Stopped)?;
        self.store.update(ws).await?;
        Ok(())
    }
}

fn build_create_request(config: &AgentWorkspaceConfig) -> CreateRequest {
    CreateRequest { image: config.base_image.clone(), resource_limits: config.resource_limits.clone(), command: None }
}
