use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WorkspaceError};
use crate::ids::WorkspaceId;

/// The kind of workload a container hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    AgentWorkspace,
    McpServer,
}

/// Isolation backend that materializes the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Firecracker,
    Gvisor,
    E2b,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firecracker => "firecracker",
            Self::Gvisor => "gvisor",
            Self::E2b => "e2b",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the workspace is hosted relative to the platform's own infra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    Managed,
    SelfHosted,
}

/// How long a workspace is allowed to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Ephemeral,
    Persistent,
}

/// Workspace status state machine.
///
/// `Creating -> Ready | Failed`; `Ready <-> Stopped`; any state can be
/// driven to `Stopped` by cleanup/teardown. `Failed` and `Stopped` are
/// terminal: no further exec/file operations are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Creating,
    Ready,
    Stopped,
    Failed,
}

impl WorkspaceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Whether a transition from `self` to `next` is permitted by the
    /// status state machine.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use WorkspaceStatus::*;
        matches!(
            (self, next),
            (Creating, Ready)
                | (Creating, Failed)
                | (Ready, Stopped)
                | (Stopped, Ready)
                | (_, Stopped)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceLimits {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
}

/// Restart policy for a persistent MCP-hosted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub name: String,
    pub image: String,
    pub cmd: Option<Vec<String>>,
    pub stdio_bridge: bool,
    pub restart_policy: RestartPolicy,
    pub environment: HashMap<String, String>,
    pub volumes: Vec<String>,
    pub resource_limits: ResourceLimits,
}

/// The central entity: a single isolated container bound (optionally) to
/// an agent session, with a status lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub agent_session_id: Option<String>,
    pub container_type: ContainerType,
    pub provider: Option<ProviderKind>,
    pub provider_container_id: Option<String>,
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub deployment_mode: DeploymentMode,
    pub lifecycle: Lifecycle,
    pub status: WorkspaceStatus,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub resource_limits: ResourceLimits,
    pub snapshot_id: Option<String>,
    pub mcp_config: Option<McpServerSpec>,
    pub metadata: HashMap<String, Value>,
}

impl Workspace {
    /// Construct a new workspace and enforce its invariants:
    /// persistent workspaces never carry an expiry, and an `mcp_server`
    /// workspace is persistent iff it carries an MCP config.
    pub fn new(
        container_type: ContainerType,
        deployment_mode: DeploymentMode,
        lifecycle: Lifecycle,
        mcp_config: Option<McpServerSpec>,
    ) -> Result<Self> {
        Self::check_mcp_persistence_invariant(container_type, lifecycle, &mcp_config)?;
        let now = Utc::now();
        Ok(Self {
            id: WorkspaceId::new(),
            agent_session_id: None,
            container_type,
            provider: None,
            provider_container_id: None,
            repo_url: None,
            branch: None,
            deployment_mode,
            lifecycle,
            status: WorkspaceStatus::Creating,
            created_at: now,
            last_used_at: now,
            expires_at: None,
            resource_limits: ResourceLimits::default(),
            snapshot_id: None,
            mcp_config,
            metadata: HashMap::new(),
        })
    }

    fn check_mcp_persistence_invariant(
        container_type: ContainerType,
        lifecycle: Lifecycle,
        mcp_config: &Option<McpServerSpec>,
    ) -> Result<()> {
        if container_type == ContainerType::McpServer {
            let should_be_persistent = mcp_config.is_some();
            let is_persistent = lifecycle == Lifecycle::Persistent;
            if should_be_persistent != is_persistent {
                return Err(WorkspaceError::ValidationError(vec![format!(
                    "mcp_server workspace must be persistent iff it has an mcp_config \
                     (mcp_config present: {should_be_persistent}, lifecycle persistent: {is_persistent})"
                )]));
            }
        }
        Ok(())
    }

    /// Set the provider binding once. The provider id is immutable once set.
    pub fn bind_provider(&mut self, provider: ProviderKind, container_id: String) -> Result<()> {
        if self.provider_container_id.is_some() {
            return Err(WorkspaceError::ValidationError(vec![
                "provider id is immutable once set".into(),
            ]));
        }
        self.provider = Some(provider);
        self.provider_container_id = Some(container_id);
        Ok(())
    }

    pub fn set_expiry(&mut self, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        if self.lifecycle == Lifecycle::Persistent && expires_at.is_some() {
            return Err(WorkspaceError::ValidationError(vec![
                "persistent workspaces must have a null expiry".into(),
            ]));
        }
        self.expires_at = expires_at;
        Ok(())
    }

    pub fn transition(&mut self, next: WorkspaceStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(WorkspaceError::ValidationError(vec![format!(
                "invalid transition {:?} -> {:?}",
                self.status, next
            )]));
        }
        self.status = next;
        Ok(())
    }

    /// Terminal states forbid further exec/file operations through tool
    /// endpoints.
    pub fn require_operable(&self, operation: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WorkspaceError::TerminalState {
                workspace_id: self.id.to_string(),
                status: format!("{:?}", self.status),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }
}
