use std::time::Duration;

use async_trait::async_trait;
use sbx_core::{ProviderKind, ResourceLimits};

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("container '{0}' not found")]
    NotFound(String),
    #[error("provider '{0}' does not support snapshots")]
    SnapshotNotSupported(String),
    #[error("exec failed: {0}")]
    Exec(String),
    #[error("provider operation failed: {0}")]
    Other(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub image: Option<String>,
    pub resource_limits: ResourceLimits,
    /// Omitted for ephemeral agent workspaces; set for persistent MCP
    /// containers with no repo checkout.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
    pub workdir: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ExecResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct ReadFileRequest {
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReadFileResponse {
    pub content: String,
    pub is_dir: bool,
    pub total_lines: usize,
    pub file_size: u64,
    pub is_binary: bool,
}

#[derive(Debug, Clone)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ListEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    pub active_count: usize,
}

#[derive(Debug, Clone)]
pub struct Capabilities {
    pub name: String,
    pub kind: ProviderKind,
    pub supports_snapshots: bool,
    pub supports_persistence: bool,
    pub supports_warm_pool: bool,
    pub requires_kvm: bool,
    pub estimated_startup_ms: u64,
}

/// Uniform sandbox contract every isolation backend implements.
/// Provider ids are globally unique per provider across the process
/// lifetime. `destroy` on an unknown id returns `ProviderError::NotFound`,
/// which callers must treat as "already gone" (success), not a hard
/// failure.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create(&self, req: CreateRequest) -> ProviderResult<String>;
    async fn destroy(&self, id: &str) -> ProviderResult<()>;
    async fn stop(&self, id: &str) -> ProviderResult<()>;
    async fn resume(&self, id: &str) -> ProviderResult<()>;
    async fn exec(&self, id: &str, req: ExecRequest) -> ProviderResult<ExecResponse>;
    async fn read_file(&self, id: &str, req: ReadFileRequest) -> ProviderResult<ReadFileResponse>;
    async fn write_file(&self, id: &str, req: WriteFileRequest) -> ProviderResult<()>;
    async fn list_files(&self, id: &str, path: &str) -> ProviderResult<Vec<ListEntry>>;
    async fn snapshot(&self, id: &str) -> ProviderResult<String>;
    async fn create_from_snapshot(&self, snapshot_id: &str, req: CreateRequest) -> ProviderResult<String>;
    async fn health(&self) -> HealthStatus;
    fn capabilities(&self) -> Capabilities;
}

/// Helper for teardown call sites: "already gone" is success.
pub fn is_already_gone(err: &ProviderError) -> bool {
    matches!(err, ProviderError::NotFound(_))
}
