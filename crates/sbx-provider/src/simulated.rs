//! Shared backend for the simulated provider implementations.
//!
//! Isolation technologies themselves are out of scope;
//! each "container" here is a scratch directory plus subprocess execution
//! scoped to it, which is enough to exercise the full `Provider` contract
//! end to end without vendoring a microVM/gVisor/e2b SDK.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::process::Command;

use crate::contract::{
    CreateRequest, ExecRequest, ExecResponse, HealthStatus, ListEntry, ProviderError,
    ProviderResult, ReadFileRequest, ReadFileResponse, WriteFileRequest,
};

struct ContainerState {
    workdir: PathBuf,
    stopped: bool,
}

pub(crate) struct SimulatedBackend {
    name: &'static str,
    containers: Mutex<HashMap<String, ContainerState>>,
    next_id: AtomicU64,
}

impl SimulatedBackend {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            containers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn mint_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}-{}", self.name, ulid::Ulid::new())
    }

    fn root(&self) -> PathBuf {
        std::env::temp_dir().join("sbx-simulated").join(self.name)
    }

    pub(crate) async fn create(&self, _req: CreateRequest) -> ProviderResult<String> {
        let id = self.mint_id();
        let workdir = self.root().join(&id);
        tokio::fs::create_dir_all(&workdir).await?;

        let mut containers = self.containers.lock().expect("lock poisoned");
        containers.insert(id.clone(), ContainerState { workdir, stopped: false });
        Ok(id)
    }

    pub(crate) async fn destroy(&self, id: &str) -> ProviderResult<()> {
        let workdir = {
            let mut containers = self.containers.lock().expect("lock poisoned");
            containers
                .remove(id)
                .ok_or_else(|| ProviderError::NotFound(id.to_string()))?
                .workdir
        };
        let _ = tokio::fs::remove_dir_all(workdir).await;
        Ok(())
    }

    pub(crate) fn stop(&self, id: &str) -> ProviderResult<()> {
        let mut containers = self.containers.lock().expect("lock poisoned");
        let state = containers
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        state.stopped = true;
        Ok(())
    }

    pub(crate) fn resume(&self, id: &str) -> ProviderResult<()> {
        let mut containers = self.containers.lock().expect("lock poisoned");
        let state = containers
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        state.stopped = false;
        Ok(())
    }

    fn workdir_of(&self, id: &str) -> ProviderResult<PathBuf> {
        let containers = self.containers.lock().expect("lock poisoned");
        containers
            .get(id)
            .map(|s| s.workdir.clone())
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    pub(crate) async fn exec(&self, id: &str, req: ExecRequest) -> ProviderResult<ExecResponse> {
        let workdir = self.workdir_of(id)?;
        let cwd = req
            .workdir
            .map(|w| workdir.join(w))
            .unwrap_or(workdir);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(format!("{} {}", req.command, req.args.join(" ")));
        cmd.current_dir(&cwd);

        let start = Instant::now();
        let output = tokio::time::timeout(req.timeout, cmd.output())
            .await
            .map_err(|_| ProviderError::Exec(format!("command timed out after {:?}", req.timeout)))?
            .map_err(|e| ProviderError::Exec(e.to_string()))?;

        Ok(ExecResponse {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
            truncated: false,
        })
    }

    pub(crate) async fn read_file(&self, id: &str, req: ReadFileRequest) -> ProviderResult<ReadFileResponse> {
        let workdir = self.workdir_of(id)?;
        let path = workdir.join(&req.path);
        let meta = tokio::fs::metadata(&path).await?;

        if meta.is_dir() {
            return Ok(ReadFileResponse {
                content: String::new(),
                is_dir: true,
                total_lines: 0,
                file_size: meta.len(),
                is_binary: false,
            });
        }

        let bytes = tokio::fs::read(&path).await?;
        let is_binary = bytes.iter().take(8192).any(|b| *b == 0);
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let total_lines = content.lines().count();

        Ok(ReadFileResponse {
            content,
            is_dir: false,
            total_lines,
            file_size: meta.len(),
            is_binary,
        })
    }

    pub(crate) async fn write_file(&self, id: &str, req: WriteFileRequest) -> ProviderResult<()> {
        let workdir = self.workdir_of(id)?;
        let path = workdir.join(&req.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, req.content).await?;
        Ok(())
    }

    pub(crate) async fn list_files(&self, id: &str, path: &str) -> ProviderResult<Vec<ListEntry>> {
        let workdir = self.workdir_of(id)?;
        let dir = workdir.join(path);
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let rel = entry
                .path()
                .strip_prefix(&workdir)
                .unwrap_or(&entry.path())
                .to_string_lossy()
                .into_owned();
            entries.push(ListEntry {
                path: rel,
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    pub(crate) async fn snapshot(&self, id: &str) -> ProviderResult<String> {
        let workdir = self.workdir_of(id)?;
        let snapshot_id = format!("snap-{}", ulid::Ulid::new());
        let dest = self.root().join("__snapshots__").join(&snapshot_id);
        tokio::fs::create_dir_all(&dest).await?;
        copy_dir_recursive(&workdir, &dest).await?;
        Ok(snapshot_id)
    }

    pub(crate) async fn create_from_snapshot(&self, snapshot_id: &str, _req: CreateRequest) -> ProviderResult<String> {
        let src = self.root().join("__snapshots__").join(snapshot_id);
        if !src.exists() {
            return Err(ProviderError::NotFound(snapshot_id.to_string()));
        }
        let id = self.mint_id();
        let workdir = self.root().join(&id);
        tokio::fs::create_dir_all(&workdir).await?;
        copy_dir_recursive(&src, &workdir).await?;

        let mut containers = self.containers.lock().expect("lock poisoned");
        containers.insert(id.clone(), ContainerState { workdir, stopped: false });
        Ok(id)
    }

    pub(crate) fn health(&self) -> HealthStatus {
        let active_count = self.containers.lock().expect("lock poisoned").len();
        HealthStatus {
            healthy: true,
            message: format!("{} simulated backend operational", self.name),
            active_count,
        }
    }
}

fn copy_dir_recursive<'a>(
    src: &'a std::path::Path,
    dest: &'a std::path::Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = tokio::fs::read_dir(src).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let dest_path = dest.join(entry.file_name());
            if meta.is_dir() {
                tokio::fs::create_dir_all(&dest_path).await?;
                copy_dir_recursive(&entry.path(), &dest_path).await?;
            } else {
                tokio::fs::copy(entry.path(), dest_path).await?;
            }
        }
        Ok(())
    })
}
