//! Contract tests for ObjectStore.
//!
//! These tests pin down the behavior every store implementation must show:
//! typed reads, namespace-scoped lists, create-once and compare-and-update.
//! They run against the in-memory fake.

use appdeployer_state::fakes::{MemoryObjectStore, Operation};
use appdeployer_state::*;

fn api_build_config() -> BuildConfig {
    BuildConfig::git(
        "prod",
        "api",
        "https://example.com/api.git",
        "v2",
        "registry/api:v2",
    )
    .with_last_version(5)
}

// ===========================================================================
// get / list
// ===========================================================================

#[tokio::test]
async fn get_returns_stored_object() {
    let store = MemoryObjectStore::new();
    store.seed(api_build_config());

    let bc: BuildConfig = store.get("prod", "api").await.unwrap();

    assert_eq!(bc.output_image(), Some("registry/api:v2"));
    assert_eq!(bc.status.last_version, 5);
    assert!(bc.metadata.uid.is_some());
    assert!(bc.metadata.resource_version.is_some());
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let store = MemoryObjectStore::new();

    let err = store.get::<ConfigMap>("prod", "nope").await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(
        err,
        StorageError::NotFound {
            kind: ResourceKind::ConfigMap,
            key: ObjectKey::new("prod", "nope"),
        }
    );
}

#[tokio::test]
async fn kinds_do_not_share_names() {
    let store = MemoryObjectStore::new();
    store.seed(ConfigMap::new("prod", "api"));

    assert!(store.get::<BuildConfig>("prod", "api").await.is_err());
}

#[tokio::test]
async fn list_is_namespace_scoped() {
    let store = MemoryObjectStore::new();
    store.seed(api_build_config());
    store.seed(BuildConfig::git("staging", "api", "u", "v1", "registry/api:v1"));

    let prod: Vec<BuildConfig> = store.list("prod").await.unwrap();
    let empty: Vec<DeploymentConfig> = store.list("prod").await.unwrap();

    assert_eq!(prod.len(), 1);
    assert_eq!(prod[0].metadata.namespace, "prod");
    assert!(empty.is_empty());
}

// ===========================================================================
// create
// ===========================================================================

#[tokio::test]
async fn create_assigns_identity() {
    let store = MemoryObjectStore::new();
    let build = Build {
        metadata: ObjectMeta::new("prod", "api-6"),
        ..Default::default()
    };

    let stored = store.create(&build).await.unwrap();

    assert!(stored.metadata.uid.is_some());
    assert!(stored.metadata.creation_timestamp.is_some());
    assert!(store.peek::<Build>("prod", "api-6").is_some());
}

#[tokio::test]
async fn create_twice_is_already_exists() {
    let store = MemoryObjectStore::new();
    let build = Build {
        metadata: ObjectMeta::new("prod", "api-6"),
        ..Default::default()
    };
    store.create(&build).await.unwrap();

    let err = store.create(&build).await.unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(store.count(Operation::Create), 2);
}

// ===========================================================================
// update (optimistic concurrency)
// ===========================================================================

#[tokio::test]
async fn update_bumps_resource_version() {
    let store = MemoryObjectStore::new();
    let seeded = store.seed(api_build_config());

    let mut bc: BuildConfig = store.get("prod", "api").await.unwrap();
    bc.status.last_version += 1;
    let stored = store.update(&bc).await.unwrap();

    assert_ne!(stored.metadata.resource_version, seeded.metadata.resource_version);
    assert_eq!(stored.metadata.uid, seeded.metadata.uid);
    assert_eq!(
        store
            .peek::<BuildConfig>("prod", "api")
            .unwrap()
            .status
            .last_version,
        6
    );
}

#[tokio::test]
async fn stale_update_is_conflict_and_leaves_object_untouched() {
    let store = MemoryObjectStore::new();
    store.seed(api_build_config());

    let mut ours: BuildConfig = store.get("prod", "api").await.unwrap();
    let mut theirs: BuildConfig = store.get("prod", "api").await.unwrap();
    theirs.status.last_version = 9;
    store.update(&theirs).await.unwrap();

    ours.status.last_version = 6;
    let err = store.update(&ours).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Conflict);
    assert_eq!(
        store
            .peek::<BuildConfig>("prod", "api")
            .unwrap()
            .status
            .last_version,
        9
    );
}

#[tokio::test]
async fn update_without_version_is_not_blind() {
    let store = MemoryObjectStore::new();
    store.seed(ConfigMap::new("prod", "app-config"));

    let blind = ConfigMap::new("prod", "app-config").with_entry("version", "v9");
    let err = store.update(&blind).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Conflict);
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let store = MemoryObjectStore::new();

    let err = store
        .update(&ConfigMap::new("prod", "gone"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn unknown_fields_survive_read_modify_write() {
    let store = MemoryObjectStore::new();
    let mut dc = DeploymentConfig::new("prod", "api-deploy")
        .with_trigger(DeploymentTriggerPolicy::image_change("registry/api:v2"));
    dc.spec
        .extra
        .insert("replicas".into(), serde_json::json!(3));
    store.seed(dc);

    let mut fetched: DeploymentConfig = store.get("prod", "api-deploy").await.unwrap();
    fetched.spec.triggers[0]
        .image_change_params_mut()
        .unwrap()
        .from
        .name = "registry/api:v3".into();
    store.update(&fetched).await.unwrap();

    let stored = store.peek::<DeploymentConfig>("prod", "api-deploy").unwrap();
    assert_eq!(stored.spec.extra["replicas"], serde_json::json!(3));
    assert_eq!(stored.image_trigger_names(), vec!["registry/api:v3"]);
}
