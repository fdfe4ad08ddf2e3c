use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Result, WorkspaceError};
use crate::ids::WorkspaceId;
use crate::workspace::{ContainerType, Workspace};

/// Filter for `ListByFilter`. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFilter {
    pub container_type: Option<ContainerType>,
    pub agent_session_id: Option<String>,
}

/// The JSONB-backed entity store is an external collaborator;
/// this trait is the narrow contract the core consumes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(&self, ws: &Workspace) -> Result<()>;
    async fn update(&self, ws: &Workspace) -> Result<()>;
    async fn delete(&self, id: WorkspaceId) -> Result<()>;
    async fn get_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>>;
    async fn list_by_filter(&self, filter: &WorkspaceFilter) -> Result<Vec<Workspace>>;
    /// Rows with `expires_at IS NOT NULL AND expires_at < now`.
    async fn list_expired(&self) -> Result<Vec<Workspace>>;
    async fn count_active(&self) -> Result<usize>;
    async fn touch(&self, id: WorkspaceId) -> Result<()>;
}

/// In-memory reference `Store` for tests and standalone operation. Not a
/// production store — the real store is JSONB-backed and lives outside
/// this crate's scope.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<HashMap<WorkspaceId, Workspace>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create(&self, ws: &Workspace) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        rows.insert(ws.id, ws.clone());
        Ok(())
    }

    async fn update(&self, ws: &Workspace) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        if !rows.contains_key(&ws.id) {
            return Err(WorkspaceError::NotFound(ws.id.to_string()));
        }
        rows.insert(ws.id, ws.clone());
        Ok(())
    }

    async fn delete(&self, id: WorkspaceId) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        rows.remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        let rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        Ok(rows.get(&id).cloned())
    }

    async fn list_by_filter(&self, filter: &WorkspaceFilter) -> Result<Vec<Workspace>> {
        let rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        Ok(rows
            .values()
            .filter(|ws| {
                filter
                    .container_type
                    .is_none_or(|ct| ct == ws.container_type)
                    && filter
                        .agent_session_id
                        .as_ref()
                        .is_none_or(|sid| ws.agent_session_id.as_ref() == Some(sid))
            })
            .cloned()
            .collect())
    }

    async fn list_expired(&self) -> Result<Vec<Workspace>> {
        let rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        let now = Utc::now();
        Ok(rows
            .values()
            .filter(|ws| ws.expires_at.is_some_and(|exp| exp < now))
            .cloned()
            .collect())
    }

    async fn count_active(&self) -> Result<usize> {
        let rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        Ok(rows
            .values()
            .filter(|ws| !ws.status.is_terminal())
            .count())
    }

    async fn touch(&self, id: WorkspaceId) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|_| WorkspaceError::StoreError("poisoned lock".into()))?;
        let ws = rows.get_mut(&id).ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        ws.touch();
        Ok(())
    }
}
