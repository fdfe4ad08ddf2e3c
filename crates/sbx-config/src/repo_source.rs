use serde::{Deserialize, Serialize};

/// Declarative source of the repository to clone, as configured on an
/// `AgentWorkspaceConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepoSource {
    Fixed {
        url: String,
        #[serde(default)]
        branch: String,
    },
    TaskContext {
        #[serde(default)]
        branch: Option<String>,
    },
    None,
}

impl Default for RepoSource {
    fn default() -> Self {
        Self::None
    }
}

/// Extracted task metadata relevant to repo-source resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContext {
    pub repository_url: Option<String>,
    pub branch: Option<String>,
    pub pull_request_number: Option<i64>,
    pub base_branch: Option<String>,
}

impl TaskContext {
    /// Extract a `TaskContext` from a task-metadata JSON mapping.
    ///
    /// Populated only if at least one recognized key is present and typed
    /// correctly; otherwise returns `None` (the "none" extraction outcome).
    pub fn extract(metadata: &serde_json::Value) -> Option<Self> {
        let map = metadata.as_object()?;
        let mut ctx = TaskContext::default();
        let mut found = false;

        if let Some(v) = map.get("repository_url") {
            if let Some(s) = v.as_str() {
                if !s.is_empty() {
                    ctx.repository_url = Some(s.to_string());
                    found = true;
                }
            }
        }

        if let Some(v) = map.get("branch") {
            if let Some(s) = v.as_str() {
                if !s.is_empty() {
                    ctx.branch = Some(s.to_string());
                    found = true;
                }
            }
        }

        if let Some(v) = map.get("pull_request_number") {
            if let Some(n) = v.as_f64() {
                if n > 0.0 && n.fract() == 0.0 {
                    ctx.pull_request_number = Some(n as i64);
                    found = true;
                }
            }
        }

        if let Some(v) = map.get("base_branch") {
            if let Some(s) = v.as_str() {
                if !s.is_empty() {
                    ctx.base_branch = Some(s.to_string());
                    found = true;
                }
            }
        }

        found.then_some(ctx)
    }
}

/// Resolve `(repo_url, branch, should_checkout)` from a `RepoSource` and an
/// optional `TaskContext`.
pub fn resolve_repo_source(
    source: &RepoSource,
    config_branch: &str,
    task_context: Option<&TaskContext>,
) -> (String, String, bool) {
    match source {
        RepoSource::Fixed { url, branch } => {
            let branch = if !branch.is_empty() { branch.clone() } else { config_branch.to_string() };
            (url.clone(), branch, true)
        }
        RepoSource::TaskContext { branch: config_override } => match task_context {
            Some(ctx) if ctx.repository_url.as_deref().is_some_and(|u| !u.is_empty()) => {
                let branch = ctx
                    .branch
                    .clone()
                    .or_else(|| config_override.clone())
                    .unwrap_or_default();
                (ctx.repository_url.clone().unwrap(), branch, true)
            }
            _ => (String::new(), String::new(), false),
        },
        RepoSource::None => (String::new(), String::new(), false),
    }
}
