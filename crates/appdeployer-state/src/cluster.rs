//! API server client
//!
//! [`KubeObjectStore`] runs every [`ObjectStore`] call through a
//! [`kube::Client`]. The OpenShift kinds have no generated bindings, so each
//! call goes through `Api<DynamicObject>` with an [`ApiResource`] derived from
//! the [`ResourceKind`], and objects are converted to and from the typed
//! model through their JSON form.

use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::model::{ObjectKey, ResourceKind};
use crate::store::{ObjectStore, Resource, StorageResult};

/// The `ApiResource` addressing `kind`.
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.as_str());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

/// Map a client error onto the storage taxonomy.
///
/// 404 is `NotFound`; 409 is `AlreadyExists` when the status reason says so
/// and `Conflict` otherwise; 408, 429 and 5xx are transient; every other
/// status is a rejection. Anything that never reached the server is
/// `Unavailable`.
pub fn classify(err: kube::Error, kind: ResourceKind, key: ObjectKey) -> StorageError {
    match err {
        kube::Error::Api(status) => match status.code {
            404 => StorageError::NotFound { kind, key },
            409 if status.reason == "AlreadyExists" => StorageError::AlreadyExists { kind, key },
            409 => StorageError::Conflict { kind, key },
            408 | 429 => StorageError::Unavailable(format!("{}: {}", status.code, status.message)),
            code if code >= 500 => {
                StorageError::Unavailable(format!("{code}: {}", status.message))
            }
            code => StorageError::Rejected {
                status: code,
                message: status.message,
            },
        },
        kube::Error::SerdeError(err) => StorageError::Serialization(err.to_string()),
        other => StorageError::Unavailable(other.to_string()),
    }
}

/// Typed object to its dynamic form, stamped with `apiVersion` and `kind`.
fn to_dynamic<R: Resource>(object: &R) -> StorageResult<DynamicObject> {
    let mut value = serde_json::to_value(object)?;
    if let Value::Object(map) = &mut value {
        map.insert("apiVersion".into(), R::KIND.api_version().into());
        map.insert("kind".into(), R::KIND.as_str().into());
    }
    Ok(serde_json::from_value(value)?)
}

fn from_dynamic<R: Resource>(object: DynamicObject) -> StorageResult<R> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Object store backed by a Kubernetes/OpenShift API server.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    /// `client` is usually `kube::Client::try_default()`: `KUBECONFIG` or
    /// `~/.kube/config` when present, the in-cluster service account
    /// otherwise.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind))
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    #[instrument(skip(self), fields(kind = %R::KIND))]
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> StorageResult<R> {
        let object = self
            .api(R::KIND, namespace)
            .get(name)
            .await
            .map_err(|e| classify(e, R::KIND, ObjectKey::new(namespace, name)))?;
        from_dynamic(object)
    }

    #[instrument(skip(self), fields(kind = %R::KIND))]
    async fn list<R: Resource>(&self, namespace: &str) -> StorageResult<Vec<R>> {
        let list = self
            .api(R::KIND, namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, R::KIND, ObjectKey::new(namespace, "")))?;
        debug!(items = list.items.len(), "listed");
        list.items.into_iter().map(from_dynamic).collect()
    }

    #[instrument(skip(self, object), fields(kind = %R::KIND, key = %object.key()))]
    async fn create<R: Resource>(&self, object: &R) -> StorageResult<R> {
        let key = object.key();
        let created = self
            .api(R::KIND, &key.namespace)
            .create(&PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| classify(e, R::KIND, key))?;
        from_dynamic(created)
    }

    /// Replace the stored object. The body's `metadata.resourceVersion` is
    /// the precondition; a stale one comes back as `Conflict`.
    #[instrument(skip(self, object), fields(kind = %R::KIND, key = %object.key()))]
    async fn update<R: Resource>(&self, object: &R) -> StorageResult<R> {
        let key = object.key();
        let replaced = self
            .api(R::KIND, &key.namespace)
            .replace(&key.name, &PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| classify(e, R::KIND, key))?;
        from_dynamic(replaced)
    }
}
