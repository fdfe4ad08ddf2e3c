use std::sync::Arc;

use sbx_checkout::CheckoutService;
use sbx_core::{ContainerType, DeploymentMode, Store};
use sbx_daemon::{app::build_engine, config::DaemonConfig};
use sbx_provisioner::Provisioner;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn test_config() -> DaemonConfig {
    DaemonConfig { warm_pool_target: 1, ..DaemonConfig::default() }
}

#[tokio::test]
async fn s1_fixed_repo_provisions_through_the_wired_engine() {
    let engine = build_engine(&test_config()).await.unwrap();
    let provisioner = Provisioner::new(engine.orchestrator.clone(), Some(engine.pool.clone()), engine.store.clone(), CheckoutService::new(None));

    let config = json!({
        "enabled": true,
        "repo_source": {"type": "fixed", "url": "", "branch": "develop"},
        "setup_commands": ["true"],
    });

    let cancel = CancellationToken::new();
    let result = provisioner
        .provision(&config, DeploymentMode::SelfHosted, Some("session-1".to_string()), None, &cancel)
        .await
        .unwrap();

    let workspace = result.workspace.expect("workspace should have been provisioned");
    assert_eq!(workspace.status, sbx_core::WorkspaceStatus::Ready);
    assert_eq!(workspace.container_type, ContainerType::AgentWorkspace);

    let stored = engine.store.get_by_id(workspace.id).await.unwrap();
    assert!(stored.is_some());

    engine.pool.stop().await;
}

#[tokio::test]
async fn disabled_config_produces_no_workspace() {
    let engine = build_engine(&test_config()).await.unwrap();
    let provisioner = Provisioner::new(engine.orchestrator.clone(), Some(engine.pool.clone()), engine.store.clone(), CheckoutService::new(None));

    let cancel = CancellationToken::new();
    let result = provisioner.provision(&json!({}), DeploymentMode::SelfHosted, None, None, &cancel).await.unwrap();
    assert!(result.workspace.is_none());
    assert!(!result.degraded);

    engine.pool.stop().await;
}

#[tokio::test]
async fn cleanup_once_sweeps_and_reports_usage() {
    let engine = build_engine(&test_config()).await.unwrap();
    engine.cleanup.run_cycle().await;
    let active = Arc::clone(&engine.store).count_active().await.unwrap();
    assert_eq!(active, 0);
    engine.pool.stop().await;
}
