//! Object store abstraction
//!
//! The store is the sole persistent owner of every resource. Callers hold
//! transient copies only and write them back through `update`, which is
//! guarded by the copy's `metadata.resource_version`.
//!
//! Implementations:
//! - [`MemoryObjectStore`](crate::fakes::MemoryObjectStore): in-memory fake for tests
//! - [`KubeObjectStore`](crate::kube::KubeObjectStore): REST client for the API server
//! - [`TimedStore`](crate::timeout::TimedStore): deadline decorator over any store

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::model::{
    Build, BuildConfig, ConfigMap, DeploymentConfig, ObjectKey, ObjectMeta, ResourceKind,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A typed resource that lives in one collection of the store.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey::new(meta.namespace.clone(), meta.name.clone())
    }
}

macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

impl_resource!(ConfigMap, ResourceKind::ConfigMap);
impl_resource!(BuildConfig, ResourceKind::BuildConfig);
impl_resource!(Build, ResourceKind::Build);
impl_resource!(DeploymentConfig, ResourceKind::DeploymentConfig);

/// Typed get/list/create/update over namespaced collections.
///
/// Guarantees:
/// - `get` on a missing object returns `StorageError::NotFound`.
/// - `create` on an existing name returns `StorageError::AlreadyExists`.
/// - `update` succeeds only when the object's `resource_version` equals the
///   stored one, otherwise `StorageError::Conflict`. It never overwrites blindly.
/// - Every successful write returns the stored object with a fresh
///   `resource_version`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object by namespace and name.
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> StorageResult<R>;

    /// List every object of a kind in a namespace.
    async fn list<R: Resource>(&self, namespace: &str) -> StorageResult<Vec<R>>;

    /// Create a new object, returning the stored copy.
    async fn create<R: Resource>(&self, object: &R) -> StorageResult<R>;

    /// Compare-and-update an existing object, returning the stored copy.
    async fn update<R: Resource>(&self, object: &R) -> StorageResult<R>;
}
