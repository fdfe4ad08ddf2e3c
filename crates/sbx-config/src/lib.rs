//! Declarative workspace configuration: parsing, validation, and
//! repo-source resolution.

mod agent_workspace_config;
mod repo_source;

pub use agent_workspace_config::{AgentWorkspaceConfig, KNOWN_TOOLS};
pub use repo_source::{resolve_repo_source, RepoSource, TaskContext};
