#[derive(thiserror::Error, Debug)]
pub enum WorkspaceError {
    #[error("provider '{0}' is not registered")]
    ProviderNotRegistered(String),

    #[error("provider '{0}' is registered but unhealthy")]
    ProviderUnhealthy(String),

    #[error("no healthy provider available for {container_type:?}/{deployment_mode:?}")]
    NoHealthyProviders {
        container_type: String,
        deployment_mode: String,
    },

    #[error("provider '{0}' does not support snapshots")]
    SnapshotNotSupported(String),

    #[error("clone failed for workspace '{workspace_id}': {message}")]
    CloneFailed { workspace_id: String, message: String },

    #[error("setup command {index} exited with code {exit_code}")]
    SetupFailed { index: usize, exit_code: i32 },

    #[error("stdio bridge is closed")]
    BridgeClosed,

    #[error("stdio bridge call timed out")]
    BridgeTimeout,

    #[error("workspace configuration is invalid: {0:?}")]
    ValidationError(Vec<String>),

    #[error("store operation failed: {0}")]
    StoreError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("workspace '{0}' not found")]
    NotFound(String),

    #[error("workspace '{workspace_id}' is in terminal state '{status}' and rejects {operation}")]
    TerminalState {
        workspace_id: String,
        status: String,
        operation: String,
    },
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_provider_not_registered() {
        let err = WorkspaceError::ProviderNotRegistered("gvisor".into());
        assert_eq!(err.to_string(), "provider 'gvisor' is not registered");
    }

    #[test]
    fn display_provider_unhealthy() {
        let err = WorkspaceError::ProviderUnhealthy("firecracker".into());
        assert_eq!(
            err.to_string(),
            "provider 'firecracker' is registered but unhealthy"
        );
    }

    #[test]
    fn display_no_healthy_providers() {
        let err = WorkspaceError::NoHealthyProviders {
            container_type: "agent_workspace".into(),
            deployment_mode: "managed".into(),
        };
        assert!(err.to_string().contains("agent_workspace"));
        assert!(err.to_string().contains("managed"));
    }

    #[test]
    fn display_snapshot_not_supported() {
        let err = WorkspaceError::SnapshotNotSupported("e2b".into());
        assert_eq!(err.to_string(), "provider 'e2b' does not support snapshots");
    }

    #[test]
    fn display_setup_failed() {
        let err = WorkspaceError::SetupFailed {
            index: 1,
            exit_code: 1,
        };
        assert_eq!(err.to_string(), "setup command 1 exited with code 1");
    }

    #[test]
    fn display_bridge_closed_and_timeout() {
        assert_eq!(WorkspaceError::BridgeClosed.to_string(), "stdio bridge is closed");
        assert_eq!(
            WorkspaceError::BridgeTimeout.to_string(),
            "stdio bridge call timed out"
        );
    }

    #[test]
    fn display_validation_error_lists_rules() {
        let err = WorkspaceError::ValidationError(vec!["unknown tool".into(), "duplicate tool".into()]);
        let text = err.to_string();
        assert!(text.contains("unknown tool"));
        assert!(text.contains("duplicate tool"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkspaceError>();
    }
}
