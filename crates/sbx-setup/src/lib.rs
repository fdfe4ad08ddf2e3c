//! Sequential setup-command executor.

use std::time::Duration;

use sbx_core::{WorkspaceError, Result};
use sbx_provider::{ExecRequest, Provider};
use tracing::warn;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs `commands` against `provider`/`container_id` in order, default
/// workdir. Stops at the first failing command (exec error or non-zero
/// exit) and returns the number of commands that completed successfully
/// plus an error describing the failing index and exit code. An empty
/// command list succeeds trivially. A missing provider is reported
/// without running anything.
pub async fn run_setup_commands(
    provider: Option<&dyn Provider>,
    container_id: &str,
    commands: &[String],
) -> Result<usize> {
    let Some(provider) = provider else {
        return Err(WorkspaceError::ProviderNotRegistered(container_id.to_string()));
    };

    if commands.is_empty() {
        return Ok(0);
    }

    for (index, command_line) in commands.iter().enumerate() {
        let mut parts = command_line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let args: Vec<String> = parts.map(str::to_string).collect();

        let response = provider
            .exec(container_id, ExecRequest { command: command.to_string(), args, workdir: None, timeout: DEFAULT_COMMAND_TIMEOUT })
            .await;

        match response {
            Ok(response) if response.exit_code == 0 => continue,
            Ok(response) => {
                warn!(container_id, index, exit_code = response.exit_code, "setup command failed");
                return Err(WorkspaceError::SetupFailed { index, exit_code: response.exit_code });
            }
            Err(err) => {
                warn!(container_id, index, error = %err, "setup command exec error");
                return Err(WorkspaceError::SetupFailed { index, exit_code: -1 });
            }
        }
    }

    Ok(commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sbx_provider::{
        Capabilities, CreateRequest, ExecResponse, HealthStatus, ListEntry, ProviderResult,
        ReadFileRequest, ReadFileResponse, WriteFileRequest,
    };
    use sbx_core::ProviderKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        failing_index: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn create(&self, _req: CreateRequest) -> ProviderResult<String> {
            unreachable!()
        }
        async fn destroy(&self, _id: &str) -> ProviderResult<()> {
            unreachable!()
        }
        async fn stop(&self, _id: &str) -> ProviderResult<()> {
            unreachable!()
        }
        async fn resume(&self, _id: &str) -> ProviderResult<()> {
            unreachable!()
        }
        async fn exec(&self, _id: &str, _req: ExecRequest) -> ProviderResult<ExecResponse> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let exit_code = if self.failing_index == Some(index) { 1 } else { 0 };
            Ok(ExecResponse { exit_code, ..Default::default() })
        }
        async fn read_file(&self, _id: &str, _req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
            unreachable!()
        }
        async fn write_file(&self, _id: &str, _req: WriteFileRequest) -> ProviderResult<()> {
            unreachable!()
        }
        async fn list_files(&self, _id: &str, _path: &str) -> ProviderResult<Vec<ListEntry>> {
            unreachable!()
        }
        async fn snapshot(&self, _id: &str) -> ProviderResult<String> {
            unreachable!()
        }
        async fn create_from_snapshot(&self, _snapshot_id: &str, _req: CreateRequest) -> ProviderResult<String> {
            unreachable!()
        }
        async fn health(&self) -> HealthStatus {
            unreachable!()
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                name: "scripted".into(),
                kind: ProviderKind::Firecracker,
                supports_snapshots: false,
                supports_persistence: false,
                supports_warm_pool: false,
                requires_kvm: false,
                estimated_startup_ms: 0,
            }
        }
    }

    #[tokio::test]
    async fn empty_commands_succeed_trivially() {
        let provider = ScriptedProvider { failing_index: None, calls: AtomicUsize::new(0) };
        let completed = run_setup_commands(Some(&provider), "c1", &[]).await.unwrap();
        assert_eq!(completed, 0);
    }

    #[tokio::test]
    async fn missing_provider_reports_without_running() {
        let err = run_setup_commands(None, "c1", &["echo hi".to_string()]).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::ProviderNotRegistered(_)));
    }

    #[tokio::test]
    async fn all_commands_succeed() {
        let provider = ScriptedProvider { failing_index: None, calls: AtomicUsize::new(0) };
        let commands = vec!["npm install".to_string(), "npm run lint".to_string()];
        let completed = run_setup_commands(Some(&provider), "c1", &commands).await.unwrap();
        assert_eq!(completed, 2);
    }

    #[tokio::test]
    async fn stops_at_first_failure_with_index_and_exit_code() {
        let provider = ScriptedProvider { failing_index: Some(1), calls: AtomicUsize::new(0) };
        let commands = vec!["npm install".to_string(), "npm test".to_string(), "npm run build".to_string()];
        let err = run_setup_commands(Some(&provider), "c1", &commands).await.unwrap_err();
        match err {
            WorkspaceError::SetupFailed { index, exit_code } => {
                assert_eq!(index, 1);
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
