//! Warm pool of pre-created `agent_workspace`/`self_hosted` containers.
//! A single lock protects pool membership; destroys and creates always
//! happen outside the lock to avoid head-of-line blocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sbx_provider::{CreateRequest, Provider};
use tokio::sync::Mutex;
use tracing::{info, warn};

const DEFAULT_RESIZE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub hits: u64,
    pub misses: u64,
    pub pool_size: usize,
    pub target_size: usize,
}

struct PoolState {
    entries: Vec<String>,
    target: usize,
    stopped: bool,
}

pub struct WarmPool {
    provider: Arc<dyn Provider>,
    state: Mutex<PoolState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl WarmPool {
    pub fn new(provider: Arc<dyn Provider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            state: Mutex::new(PoolState { entries: Vec::new(), target: 0, stopped: false }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Spawns `target_size` parallel creation tasks, waits for all to
    /// settle, appends successes, and logs failures individually.
    pub async fn start(&self, target_size: usize) {
        {
            let mut state = self.state.lock().await;
            state.target = target_size;
        }

        let created = self.create_many(target_size).await;
        let mut state = self.state.lock().await;
        state.entries.extend(created);
        info!(pool_size = state.entries.len(), target = state.target, "warm pool started");
    }

    async fn create_many(&self, count: usize) -> Vec<String> {
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let provider = self.provider.clone();
            handles.push(tokio::spawn(async move { provider.create(CreateRequest::default()).await }));
        }
        let mut created = Vec::with_capacity(count);
        for handle in handles {
            match handle.await {
                Ok(Ok(id)) => created.push(id),
                Ok(Err(err)) => warn!(error = %err, "warm container creation failed"),
                Err(err) => warn!(error = %err, "warm container creation task panicked"),
            }
        }
        created
    }

    async fn destroy_many(&self, ids: Vec<String>) {
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let provider = self.provider.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = provider.destroy(&id).await {
                    warn!(container_id = %id, error = %err, "warm container teardown failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Takes the first matching entry, removing it from the pool and
    /// kicking off an async replenish. Resolves to `None` on miss.
    pub fn acquire(self: &Arc<Self>) -> AcquireFuture {
        AcquireFuture { pool: self.clone() }
    }

    async fn acquire_inner(self: &Arc<Self>) -> Option<String> {
        let taken = {
            let mut state = self.state.lock().await;
            if state.entries.is_empty() {
                None
            } else {
                Some(state.entries.remove(0))
            }
        };

        match taken {
            Some(id) => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                let pool = self.clone();
                tokio::spawn(async move { pool.replenish().await });
                Some(id)
            }
            None => {
                self.misses.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    /// Re-checks the target under the lock before appending; if the pool
    /// is already full or stopped, the just-created container is
    /// destroyed instead of appended.
    pub async fn replenish(&self) {
        let id = match self.provider.create(CreateRequest::default()).await {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "replenish creation failed");
                return;
            }
        };

        let should_destroy = {
            let mut state = self.state.lock().await;
            if state.stopped || state.entries.len() >= state.target {
                true
            } else {
                state.entries.push(id.clone());
                false
            }
        };

        if should_destroy {
            if let Err(err) = self.provider.destroy(&id).await {
                warn!(container_id = %id, error = %err, "discarding surplus replenished container failed");
            }
        }
    }

    /// Sets a new target under the lock, then drains excess (parallel
    /// destroy) or fills deficit (parallel create) within `timeout`.
    pub async fn resize(&self, new_target: usize) {
        self.resize_with_timeout(new_target, DEFAULT_RESIZE_TIMEOUT).await;
    }

    pub async fn resize_with_timeout(&self, new_target: usize, timeout: Duration) {
        let (to_create, to_destroy) = {
            let mut state = self.state.lock().await;
            state.target = new_target;
            if state.entries.len() > new_target {
                let excess = state.entries.split_off(new_target);
                (0, excess)
            } else {
                (new_target - state.entries.len(), Vec::new())
            }
        };

        let fut = async {
            if !to_destroy.is_empty() {
                self.destroy_many(to_destroy).await;
            }
            if to_create > 0 {
                let created = self.create_many(to_create).await;
                let mut state = self.state.lock().await;
                let room = state.target.saturating_sub(state.entries.len());
                let (keep, discard) = if created.len() > room {
                    let mut created = created;
                    let discard = created.split_off(room);
                    (created, discard)
                } else {
                    (created, Vec::new())
                };
                state.entries.extend(keep);
                drop(state);
                if !discard.is_empty() {
                    self.destroy_many(discard).await;
                }
            }
        };

        if tokio::time::timeout(timeout, fut).await.is_err() {
            warn!(new_target, "pool resize did not complete within the bounded timeout");
        }
    }

    /// Idempotent: destroys every warm container in parallel.
    pub async fn stop(&self) {
        let entries = {
            let mut state = self.state.lock().await;
            if state.stopped {
                return;
            }
            state.stopped = true;
            std::mem::take(&mut state.entries)
        };
        self.destroy_many(entries).await;
    }

    pub async fn metrics(&self) -> PoolMetrics {
        let state = self.state.lock().await;
        PoolMetrics {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            pool_size: state.entries.len(),
            target_size: state.target,
        }
    }
}

/// Lazily-driven future returned by [`WarmPool::acquire`] so the call site
/// reads as `pool.acquire().await` without borrowing issues against `Arc<Self>`.
pub struct AcquireFuture {
    pool: Arc<WarmPool>,
}

impl std::future::IntoFuture for AcquireFuture {
    type Output = Option<String>;
    type IntoFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Option<String>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.pool.acquire_inner().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sbx_core::ProviderKind;
    use sbx_provider::{
        Capabilities, ExecRequest, ExecResponse, HealthStatus, ListEntry, ProviderResult,
        ReadFileRequest, ReadFileResponse, WriteFileRequest,
    };
    use std::sync::atomic::AtomicU64 as Counter;

    struct CountingProvider {
        created: Counter,
        destroyed: Counter,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self { created: Counter::new(0), destroyed: Counter::new(0) })
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        async fn create(&self, _req: CreateRequest) -> ProviderResult<String> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("container-{n}"))
        }
        async fn destroy(&self, _id: &str) -> ProviderResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self, _id: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn resume(&self, _id: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn exec(&self, _id: &str, _req: ExecRequest) -> ProviderResult<ExecResponse> {
            Ok(ExecResponse::default())
        }
        async fn read_file(&self, _id: &str, _req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
            Ok(ReadFileResponse::default())
        }
        async fn write_file(&self, _id: &str, _req: WriteFileRequest) -> ProviderResult<()> {
            Ok(())
        }
        async fn list_files(&self, _id: &str, _path: &str) -> ProviderResult<Vec<ListEntry>> {
            Ok(vec![])
        }
        async fn snapshot(&self, _id: &str) -> ProviderResult<String> {
            Ok("snap".into())
        }
        async fn create_from_snapshot(&self, _snapshot_id: &str, _req: CreateRequest) -> ProviderResult<String> {
            Ok("restored".into())
        }
        async fn health(&self) -> HealthStatus {
            HealthStatus { healthy: true, message: String::new(), active_count: 0 }
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                name: "counting".into(),
                kind: ProviderKind::Firecracker,
                supports_snapshots: false,
                supports_persistence: true,
                supports_warm_pool: true,
                requires_kvm: false,
                estimated_startup_ms: 1,
            }
        }
    }

    #[tokio::test]
    async fn start_fills_pool_to_target() {
        let pool = WarmPool::new(CountingProvider::new());
        pool.start(3).await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.pool_size, 3);
        assert_eq!(metrics.target_size, 3);
    }

    #[tokio::test]
    async fn acquire_hit_then_miss() {
        let pool = WarmPool::new(CountingProvider::new());
        pool.start(1).await;

        let id = pool.acquire().await;
        assert!(id.is_some());

        // the replenish task is spawned but not necessarily finished; give
        // it a moment before asserting on hits/misses alone.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.hits, 1);

        pool.stop().await;
        let id2 = pool.acquire().await;
        assert!(id2.is_none());
        let metrics = pool.metrics().await;
        assert_eq!(metrics.misses, 1);
    }

    #[tokio::test]
    async fn resize_drains_excess() {
        let pool = WarmPool::new(CountingProvider::new());
        pool.start(4).await;
        pool.resize(1).await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.pool_size, 1);
        assert_eq!(metrics.target_size, 1);
    }

    #[tokio::test]
    async fn resize_fills_deficit() {
        let pool = WarmPool::new(CountingProvider::new());
        pool.start(1).await;
        pool.resize(3).await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.pool_size, 3);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_empties_pool() {
        let pool = WarmPool::new(CountingProvider::new());
        pool.start(2).await;
        pool.stop().await;
        pool.stop().await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.pool_size, 0);
    }

    #[tokio::test]
    async fn replenish_after_stop_destroys_instead_of_appending() {
        let provider = CountingProvider::new();
        let pool = WarmPool::new(provider.clone());
        pool.start(1).await;
        pool.stop().await;
        pool.replenish().await;
        let metrics = pool.metrics().await;
        assert_eq!(metrics.pool_size, 0);
        assert!(provider.destroyed.load(Ordering::SeqCst) >= 1);
    }
}
