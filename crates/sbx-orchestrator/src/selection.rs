use sbx_core::{ContainerType, DeploymentMode, ProviderKind};

/// Deterministic provider preference chains keyed by
/// `(container_type, deployment_mode)`. Order matters.
pub fn preference_chain(container_type: ContainerType, deployment_mode: DeploymentMode) -> &'static [ProviderKind] {
    use ContainerType::*;
    use DeploymentMode::*;
    use ProviderKind::*;

    match (container_type, deployment_mode) {
        (AgentWorkspace, SelfHosted) => &[Firecracker, Gvisor, E2b],
        (AgentWorkspace, Managed) => &[E2b, Firecracker, Gvisor],
        (McpServer, SelfHosted) => &[Gvisor, Firecracker, E2b],
        (McpServer, Managed) => &[Gvisor, E2b, Firecracker],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_match_the_documented_table() {
        assert_eq!(
            preference_chain(ContainerType::AgentWorkspace, DeploymentMode::SelfHosted),
            &[ProviderKind::Firecracker, ProviderKind::Gvisor, ProviderKind::E2b]
        );
        assert_eq!(
            preference_chain(ContainerType::AgentWorkspace, DeploymentMode::Managed),
            &[ProviderKind::E2b, ProviderKind::Firecracker, ProviderKind::Gvisor]
        );
        assert_eq!(
            preference_chain(ContainerType::McpServer, DeploymentMode::SelfHosted),
            &[ProviderKind::Gvisor, ProviderKind::Firecracker, ProviderKind::E2b]
        );
        assert_eq!(
            preference_chain(ContainerType::McpServer, DeploymentMode::Managed),
            &[ProviderKind::Gvisor, ProviderKind::E2b, ProviderKind::Firecracker]
        );
    }
}
