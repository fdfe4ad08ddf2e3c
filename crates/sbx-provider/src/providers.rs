use async_trait::async_trait;
use sbx_core::ProviderKind;

use crate::contract::{
    Capabilities, CreateRequest, ExecRequest, ExecResponse, HealthStatus, ListEntry, Provider,
    ProviderError, ProviderResult, ReadFileRequest, ReadFileResponse, WriteFileRequest,
};
use crate::simulated::SimulatedBackend;

/// microVM-backed provider. Requires KVM on the host in a real deployment;
/// the strongest persistence/snapshot support of the three.
pub struct FirecrackerProvider {
    backend: SimulatedBackend,
}

impl FirecrackerProvider {
    pub fn new() -> Self {
        Self { backend: SimulatedBackend::new("firecracker") }
    }
}

impl Default for FirecrackerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FirecrackerProvider {
    async fn create(&self, req: CreateRequest) -> ProviderResult<String> {
        self.backend.create(req).await
    }
    async fn destroy(&self, id: &str) -> ProviderResult<()> {
        self.backend.destroy(id).await
    }
    async fn stop(&self, id: &str) -> ProviderResult<()> {
        self.backend.stop(id)
    }
    async fn resume(&self, id: &str) -> ProviderResult<()> {
        self.backend.resume(id)
    }
    async fn exec(&self, id: &str, req: ExecRequest) -> ProviderResult<ExecResponse> {
        self.backend.exec(id, req).await
    }
    async fn read_file(&self, id: &str, req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
        self.backend.read_file(id, req).await
    }
    async fn write_file(&self, id: &str, req: WriteFileRequest) -> ProviderResult<()> {
        self.backend.write_file(id, req).await
    }
    async fn list_files(&self, id: &str, path: &str) -> ProviderResult<Vec<ListEntry>> {
        self.backend.list_files(id, path).await
    }
    async fn snapshot(&self, id: &str) -> ProviderResult<String> {
        self.backend.snapshot(id).await
    }
    async fn create_from_snapshot(&self, snapshot_id: &str, req: CreateRequest) -> ProviderResult<String> {
        self.backend.create_from_snapshot(snapshot_id, req).await
    }
    async fn health(&self) -> HealthStatus {
        self.backend.health()
    }
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "firecracker".into(),
            kind: ProviderKind::Firecracker,
            supports_snapshots: true,
            supports_persistence: true,
            supports_warm_pool: true,
            requires_kvm: true,
            estimated_startup_ms: 150,
        }
    }
}

/// User-space kernel sandbox provider. No snapshot support.
pub struct GvisorProvider {
    backend: SimulatedBackend,
}

impl GvisorProvider {
    pub fn new() -> Self {
        Self { backend: SimulatedBackend::new("gvisor") }
    }
}

impl Default for GvisorProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for GvisorProvider {
    async fn create(&self, req: CreateRequest) -> ProviderResult<String> {
        self.backend.create(req).await
    }
    async fn destroy(&self, id: &str) -> ProviderResult<()> {
        self.backend.destroy(id).await
    }
    async fn stop(&self, id: &str) -> ProviderResult<()> {
        self.backend.stop(id)
    }
    async fn resume(&self, id: &str) -> ProviderResult<()> {
        self.backend.resume(id)
    }
    async fn exec(&self, id: &str, req: ExecRequest) -> ProviderResult<ExecResponse> {
        self.backend.exec(id, req).await
    }
    async fn read_file(&self, id: &str, req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
        self.backend.read_file(id, req).await
    }
    async fn write_file(&self, id: &str, req: WriteFileRequest) -> ProviderResult<()> {
        self.backend.write_file(id, req).await
    }
    async fn list_files(&self, id: &str, path: &str) -> ProviderResult<Vec<ListEntry>> {
        self.backend.list_files(id, path).await
    }
    async fn snapshot(&self, _id: &str) -> ProviderResult<String> {
        Err(ProviderError::SnapshotNotSupported("gvisor".into()))
    }
    async fn create_from_snapshot(&self, _snapshot_id: &str, _req: CreateRequest) -> ProviderResult<String> {
        Err(ProviderError::SnapshotNotSupported("gvisor".into()))
    }
    async fn health(&self) -> HealthStatus {
        self.backend.health()
    }
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "gvisor".into(),
            kind: ProviderKind::Gvisor,
            supports_snapshots: false,
            supports_persistence: true,
            supports_warm_pool: true,
            requires_kvm: false,
            estimated_startup_ms: 80,
        }
    }
}

/// Remote managed sandbox provider. Slower to start, no warm pool or
/// persistence across restarts of the managing process.
pub struct E2bProvider {
    backend: SimulatedBackend,
}

impl E2bProvider {
    pub fn new() -> Self {
        Self { backend: SimulatedBackend::new("e2b") }
    }
}

impl Default for E2bProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for E2bProvider {
    async fn create(&self, req: CreateRequest) -> ProviderResult<String> {
        self.backend.create(req).await
    }
    async fn destroy(&self, id: &str) -> ProviderResult<()> {
        self.backend.destroy(id).await
    }
    async fn stop(&self, id: &str) -> ProviderResult<()> {
        self.backend.stop(id)
    }
    async fn resume(&self, id: &str) -> ProviderResult<()> {
        self.backend.resume(id)
    }
    async fn exec(&self, id: &str, req: ExecRequest) -> ProviderResult<ExecResponse> {
        self.backend.exec(id, req).await
    }
    async fn read_file(&self, id: &str, req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
        self.backend.read_file(id, req).await
    }
    async fn write_file(&self, id: &str, req: WriteFileRequest) -> ProviderResult<()> {
        self.backend.write_file(id, req).await
    }
    async fn list_files(&self, id: &str, path: &str) -> ProviderResult<Vec<ListEntry>> {
        self.backend.list_files(id, path).await
    }
    async fn snapshot(&self, id: &str) -> ProviderResult<String> {
        self.backend.snapshot(id).await
    }
    async fn create_from_snapshot(&self, snapshot_id: &str, req: CreateRequest) -> ProviderResult<String> {
        self.backend.create_from_snapshot(snapshot_id, req).await
    }
    async fn health(&self) -> HealthStatus {
        self.backend.health()
    }
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "e2b".into(),
            kind: ProviderKind::E2b,
            supports_snapshots: true,
            supports_persistence: false,
            supports_warm_pool: false,
            requires_kvm: false,
            estimated_startup_ms: 500,
        }
    }
}
