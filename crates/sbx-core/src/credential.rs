use async_trait::async_trait;

/// Credential provider contract. Either operation may fail; the
/// core degrades to unauthenticated / default identity rather than
/// propagating the error to the caller.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_installation_token(&self) -> anyhow::Result<String>;
    async fn get_bot_identity(&self) -> anyhow::Result<(String, String)>;
}

/// Default identity used when no credential provider is configured or the
/// bot-identity lookup fails.
pub const DEFAULT_BOT_NAME: &str = "Emergent Agent";
pub const DEFAULT_BOT_EMAIL: &str = "agent@emergent.local";

/// A credential provider that always fails, exercising the unauthenticated
/// degradation path. Not for production use.
pub struct NoopCredentialProvider;

#[async_trait]
impl CredentialProvider for NoopCredentialProvider {
    async fn get_installation_token(&self) -> anyhow::Result<String> {
        anyhow::bail!("no credential provider configured")
    }

    async fn get_bot_identity(&self) -> anyhow::Result<(String, String)> {
        anyhow::bail!("no credential provider configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_provider_fails_both_operations() {
        let provider = NoopCredentialProvider;
        assert!(provider.get_installation_token().await.is_err());
        assert!(provider.get_bot_identity().await.is_err());
    }
}
