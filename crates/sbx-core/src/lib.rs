//! Shared entity model, error taxonomy, and store/credential contracts for
//! the workspace orchestration engine.

mod credential;
mod error;
mod ids;
mod store;
mod workspace;

pub use credential::{CredentialProvider, NoopCredentialProvider, DEFAULT_BOT_EMAIL, DEFAULT_BOT_NAME};
pub use error::{Result, WorkspaceError};
pub use ids::WorkspaceId;
pub use store::{InMemoryStore, Store, WorkspaceFilter};
pub use workspace::{
    ContainerType, DeploymentMode, Lifecycle, McpServerSpec, ProviderKind, ResourceLimits,
    RestartPolicy, Workspace, WorkspaceStatus,
};
