//! Integration tests for manager initialization and configuration bootstrap.

use std::sync::Arc;

use quovol::{
    ApiSettings, BootstrapOptions, ManagerOptions, QuovolError, QuovolResult, RemoteVolumes,
    VolumeManager,
};
use quovol_test_utils::{FakeMounter, FakeResolver, TestContext};

fn config_exists(ctx: &TestContext) -> bool {
    ctx.root().join("quobyte.cfg").exists()
}

#[tokio::test]
async fn fresh_root_persists_configuration_with_defaults() {
    let ctx = TestContext::new();
    let manager = ctx.manager().await;

    assert!(config_exists(&ctx));
    assert!(ctx.root().join("mounts").is_dir());
    assert!(ctx.root().join("logs").is_dir());

    let config = manager.config();
    assert_eq!(config.registries, "quobyte-1:7861");
    assert_eq!(config.user, "root");
    assert_eq!(config.group, "nfsnobody");
    assert_eq!(config.volume_config, "BASE");
    assert_eq!(config.api_user, "admin");

    let connections = ctx.remote.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].url, "http://quobyte-api:7860");
    assert_eq!(connections[0].user, "admin");
    assert_eq!(connections[0].password, "quobyte");
}

#[tokio::test]
async fn explicit_defaults_are_applied_to_new_volumes() {
    let ctx = TestContext::new()
        .with_bootstrap("quobyte.defaultuser", "alice")
        .with_bootstrap("quobyte.defaultgroup", "staff")
        .with_bootstrap("quobyte.defaultvolumeconfig", "REPLICATED");
    let manager = ctx.manager().await;

    let info = manager.create_volume("vol1").await.unwrap();
    assert_eq!(info.user, "alice");
    assert_eq!(info.group, "staff");
    assert_eq!(info.volume_config, "REPLICATED");

    let request = &ctx.remote.created()[0];
    assert_eq!(request.root_user, "alice");
    assert_eq!(request.root_group, "staff");
    assert_eq!(request.configuration, "REPLICATED");
}

#[tokio::test]
async fn invalid_registry_fails_without_persisting() {
    let ctx = TestContext::new().with_bootstrap("quobyte.registries", "not-a-host!!");

    let err = ctx.start().await.err().expect("initialize should fail");
    assert!(matches!(err, QuovolError::Config(_)));
    assert!(!config_exists(&ctx));
    assert!(ctx.remote.connections().is_empty());
}

#[tokio::test]
async fn unresolvable_registry_fails_without_persisting() {
    let ctx = TestContext::new()
        .with_bootstrap("quobyte.registries", "quobyte-1:7861,nowhere.invalid:7861");

    let err = ctx.start().await.err().expect("initialize should fail");
    assert!(matches!(err, QuovolError::Config(msg) if msg.contains("nowhere.invalid")));
    assert!(!config_exists(&ctx));
}

#[tokio::test]
async fn missing_required_options_fail() {
    let ctx = TestContext::new();

    for bootstrap in [
        BootstrapOptions::new().with("quobyte.registries", "quobyte-1:7861"),
        BootstrapOptions::new().with("quobyte.apiurl", "http://quobyte-api:7860"),
    ] {
        let options = ManagerOptions {
            root_dir: ctx.root().to_path_buf(),
            bootstrap,
        };
        let result = VolumeManager::initialize(
            options,
            &ctx.remote.connector(),
            ctx.mounter.clone(),
            &ctx.resolver,
        )
        .await;
        assert!(matches!(result.err(), Some(QuovolError::Config(_))));
    }
    assert!(!config_exists(&ctx));
}

#[tokio::test]
async fn persisted_configuration_wins_on_restart() {
    let mut ctx = TestContext::new().with_bootstrap("quobyte.defaultuser", "alice");
    drop(ctx.manager().await);

    // Restart with different (even invalid) registries: the stored config is used
    ctx.bootstrap = BootstrapOptions::new()
        .with("quobyte.registries", "not-a-host!!")
        .with("quobyte.apipassword", "s3cret");
    let manager = ctx.manager().await;

    assert_eq!(manager.config().user, "alice");
    assert_eq!(manager.config().registries, "quobyte-1:7861");

    // URL comes from the stored config, the password from this start only
    let connections = ctx.remote.connections();
    let latest = connections.last().unwrap();
    assert_eq!(latest.url, "http://quobyte-api:7860");
    assert_eq!(latest.password, "s3cret");

    let stored = std::fs::read_to_string(ctx.root().join("quobyte.cfg")).unwrap();
    assert!(!stored.contains("s3cret"));
}

#[tokio::test]
async fn invalid_timeout_is_a_config_error() {
    let ctx = TestContext::new().with_bootstrap("quobyte.mounttimeout", "0");
    assert!(matches!(
        ctx.start().await.err(),
        Some(QuovolError::Config(_))
    ));
}

#[tokio::test]
async fn relative_root_is_rejected() {
    let ctx = TestContext::new();
    let options = ManagerOptions {
        root_dir: "relative/root".into(),
        bootstrap: ctx.bootstrap.clone(),
    };
    let result = VolumeManager::initialize(
        options,
        &ctx.remote.connector(),
        FakeMounter::new(),
        &FakeResolver::default(),
    )
    .await;
    assert!(matches!(result.err(), Some(QuovolError::Config(_))));
}

#[tokio::test]
async fn connector_failure_aborts_startup() {
    let ctx = TestContext::new();
    let connector = |_: &ApiSettings| -> QuovolResult<Arc<dyn RemoteVolumes>> {
        Err(QuovolError::Config("bad credentials".into()))
    };

    let result = VolumeManager::initialize(
        ctx.options(),
        &connector,
        ctx.mounter.clone(),
        &ctx.resolver,
    )
    .await;
    assert!(matches!(result.err(), Some(QuovolError::Config(msg)) if msg == "bad credentials"));
}
