//! MCP hosting supervisor: owns one persistent container per
//! registered MCP server, a stdio bridge into its process, and a crash
//! monitor that restarts it per the configured policy with exponential
//! backoff. The MCP server's own OS process is spawned directly rather
//! than through the generic sandbox contract, since that contract has no
//! long-lived-process notion; the `Provider` binding tracks the backing
//! container for bookkeeping and teardown parity with the rest of the
//! engine.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sbx_core::{ContainerType, DeploymentMode, Lifecycle, McpServerSpec, RestartPolicy, Workspace};
use sbx_mcp::StdioBridge;
use sbx_orchestrator::Orchestrator;
use sbx_provider::CreateRequest;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CRASH_WINDOW: Duration = Duration::from_secs(60);
const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const BACKOFF_MULTIPLIER: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Next backoff in the 5 → 15 → 45 → 135 → 300 → 300 … progression.
pub fn next_backoff(current: Duration) -> Duration {
    (current * BACKOFF_MULTIPLIER).min(MAX_BACKOFF)
}

struct SupervisedState {
    workspace: Workspace,
    bridge: Arc<StdioBridge>,
    child: tokio::process::Child,
}

/// Supervises a single MCP server across restarts.
pub struct McpSupervisor {
    spec: McpServerSpec,
    orchestrator: Arc<Orchestrator>,
    state: Mutex<Option<SupervisedState>>,
    crash_times: Mutex<VecDeque<DateTime<Utc>>>,
    backoff: Mutex<Duration>,
    stop_flag: AtomicBool,
    restart_count: AtomicU32,
}

impl McpSupervisor {
    pub fn new(spec: McpServerSpec, orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        Arc::new(Self {
            spec,
            orchestrator,
            state: Mutex::new(None),
            crash_times: Mutex::new(VecDeque::new()),
            backoff: Mutex::new(INITIAL_BACKOFF),
            stop_flag: AtomicBool::new(false),
            restart_count: AtomicU32::new(0),
        })
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::SeqCst)
    }

    /// Creates the persistent workspace, spawns the server process, opens
    /// the bridge, and starts the crash-monitor task.
    pub async fn start(self: &Arc<Self>, deployment_mode: DeploymentMode) -> anyhow::Result<()> {
        let supervised = self.spawn(deployment_mode).await?;
        *self.state.lock().await = Some(supervised);

        let this = self.clone();
        tokio::spawn(async move { this.crash_monitor(deployment_mode).await });
        Ok(())
    }

    async fn spawn(&self, deployment_mode: DeploymentMode) -> anyhow::Result<SupervisedState> {
        let provider = self
            .orchestrator
            .select_provider(ContainerType::McpServer, deployment_mode, None)
            .await?;
        let container_id = provider
            .create(CreateRequest { image: Some(self.spec.image.clone()), resource_limits: self.spec.resource_limits.clone(), command: self.spec.cmd.clone() })
            .await?;

        let mut workspace = Workspace::new(ContainerType::McpServer, deployment_mode, Lifecycle::Persistent, Some(self.spec.clone()))?;
        workspace.bind_provider(provider.capabilities().kind, container_id.clone())?;
        workspace.transition(sbx_core::WorkspaceStatus::Ready)?;

        let mut command_parts = self.spec.cmd.clone().unwrap_or_else(|| vec!["true".to_string()]);
        let program = command_parts.remove(0);
        let mut child = Command::new(program)
            .args(command_parts)
            .envs(self.spec.environment.clone())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin piped");
        let stdout = child.stdout.take().expect("stdout piped");
        let bridge = Arc::new(StdioBridge::new(stdin, stdout));

        info!(workspace_id = %workspace.id, server = %self.spec.name, "mcp server started");
        Ok(SupervisedState { workspace, bridge, child })
    }

    pub async fn bridge(&self) -> Option<Arc<StdioBridge>> {
        self.state.lock().await.as_ref().map(|s| s.bridge.clone())
    }

    async fn crash_monitor(self: Arc<Self>, deployment_mode: DeploymentMode) {
        loop {
            let exit_status = {
                let mut guard = self.state.lock().await;
                let Some(state) = guard.as_mut() else { return };
                state.child.wait().await
            };

            if self.stop_flag.load(Ordering::SeqCst) {
                return;
            }

            let exit_status = match exit_status {
                Ok(status) => status,
                Err(err) => {
                    warn!(server = %self.spec.name, error = %err, "failed to wait on mcp server process");
                    return;
                }
            };

            warn!(server = %self.spec.name, ?exit_status, "mcp server exited unexpectedly");
            let isolated_crash = self.record_crash().await;

            let should_restart = match self.spec.restart_policy {
                RestartPolicy::Always => true,
                RestartPolicy::OnFailure => !exit_status.success(),
                RestartPolicy::Never => false,
            };
            if !should_restart {
                return;
            }

            let delay = {
                let mut backoff = self.backoff.lock().await;
                if isolated_crash {
                    *backoff = INITIAL_BACKOFF;
                }
                let delay = *backoff;
                *backoff = next_backoff(*backoff);
                delay
            };
            tokio::time::sleep(delay).await;

            if self.stop_flag.load(Ordering::SeqCst) {
                return;
            }

            match self.spawn(deployment_mode).await {
                Ok(new_state) => {
                    self.restart_count.fetch_add(1, Ordering::SeqCst);
                    *self.state.lock().await = Some(new_state);
                }
                Err(err) => {
                    warn!(server = %self.spec.name, error = %err, "mcp server restart failed");
                    return;
                }
            }
        }
    }

    /// Records a crash and prunes entries older than `CRASH_WINDOW`.
    /// Returns `true` when the prune leaves this crash alone in the window,
    /// meaning either it's the first crash ever or the server stayed up
    /// longer than the window before crashing again — the signal used to
    /// reset backoff.
    async fn record_crash(&self) -> bool {
        let now = Utc::now();
        let mut crashes = self.crash_times.lock().await;
        crashes.push_back(now);
        while crashes.front().is_some_and(|t| now - *t > chrono::Duration::from_std(CRASH_WINDOW).unwrap()) {
            crashes.pop_front();
        }
        crashes.len() == 1
    }

    pub async fn crash_count_in_window(&self) -> usize {
        self.crash_times.lock().await.len()
    }

    /// Sets the stop flag and tears the container down. The crash monitor
    /// observes the flag after its next backoff delay and exits.
    pub async fn shutdown(&self, deadline: Duration) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let mut guard = self.state.lock().await;
        if let Some(mut state) = guard.take() {
            state.bridge.close().await;
            let kill = async {
                let _ = state.child.kill().await;
            };
            if tokio::time::timeout(deadline, kill).await.is_err() {
                warn!(server = %self.spec.name, "mcp server shutdown exceeded deadline");
            }

            if let (Some(kind), Some(container_id)) = (state.workspace.provider, &state.workspace.provider_container_id) {
                if let Ok(provider) = self
                    .orchestrator
                    .select_provider(state.workspace.container_type, state.workspace.deployment_mode, Some(kind))
                    .await
                {
                    let _ = provider.destroy(container_id).await;
                }
            }
        }
    }
}

/// Shuts every supervisor down in parallel, honoring a shared deadline.
pub async fn shutdown_all(supervisors: &[Arc<McpSupervisor>], deadline: Duration) {
    let handles: Vec<_> = supervisors
        .iter()
        .cloned()
        .map(|supervisor| tokio::spawn(async move { supervisor.shutdown(deadline).await }))
        .collect();
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_progression_matches_documented_sequence() {
        let mut backoff = INITIAL_BACKOFF;
        let expected = [5, 15, 45, 135, 300, 300];
        for expected_secs in expected {
            assert_eq!(backoff, Duration::from_secs(expected_secs));
            backoff = next_backoff(backoff);
        }
    }

    #[tokio::test]
    async fn start_stop_never_policy_does_not_restart() {
        let spec = McpServerSpec {
            name: "echo".into(),
            image: "local".into(),
            cmd: Some(vec!["sh".into(), "-c".into(), "exit 0".into()]),
            stdio_bridge: true,
            restart_policy: RestartPolicy::Never,
            environment: Default::default(),
            volumes: Vec::new(),
            resource_limits: Default::default(),
        };
        let orchestrator = Arc::new(Orchestrator::new());
        orchestrator.register(sbx_core::ProviderKind::Gvisor, Arc::new(sbx_provider::GvisorProvider::new())).await;
        orchestrator.run_health_tick().await;

        let supervisor = McpSupervisor::new(spec, orchestrator);
        supervisor.start(DeploymentMode::SelfHosted).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(supervisor.restart_count(), 0);
        supervisor.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn always_policy_restarts_after_crash() {
        let spec = McpServerSpec {
            name: "flaky".into(),
            image: "local".into(),
            cmd: Some(vec!["sh".into(), "-c".into(), "exit 1".into()]),
            stdio_bridge: true,
            restart_policy: RestartPolicy::Always,
            environment: Default::default(),
            volumes: Vec::new(),
            resource_limits: Default::default(),
        };
        let orchestrator = Arc::new(Orchestrator::new());
        orchestrator.register(sbx_core::ProviderKind::Gvisor, Arc::new(sbx_provider::GvisorProvider::new())).await;
        orchestrator.run_health_tick().await;

        let supervisor = McpSupervisor::new(spec, orchestrator);
        // Shrink backoff for the test so we don't wait 5 real seconds.
        *supervisor.backoff.lock().await = Duration::from_millis(10);
        supervisor.start(DeploymentMode::SelfHosted).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(supervisor.restart_count() >= 1);
        supervisor.shutdown(Duration::from_secs(5)).await;
    }
}
