//! Deadline decorator for object stores
//!
//! Wraps any [`ObjectStore`] so that every call carries a bounded deadline.
//! An expired call surfaces as `StorageError::Timeout`, which classifies as
//! transient.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::store::{ObjectStore, Resource, StorageResult};

#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S: ObjectStore> TimedStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StorageResult<T>>,
    ) -> StorageResult<T> {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                operation,
                after: self.deadline,
            }),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for TimedStore<S> {
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> StorageResult<R> {
        self.bounded("get", self.inner.get(namespace, name)).await
    }

    async fn list<R: Resource>(&self, namespace: &str) -> StorageResult<Vec<R>> {
        self.bounded("list", self.inner.list(namespace)).await
    }

    async fn create<R: Resource>(&self, object: &R) -> StorageResult<R> {
        self.bounded("create", self.inner.create(object)).await
    }

    async fn update<R: Resource>(&self, object: &R) -> StorageResult<R> {
        self.bounded("update", self.inner.update(object)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::fakes::MemoryObjectStore;
    use crate::model::ConfigMap;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_as_transient() {
        let store = MemoryObjectStore::new();
        store.seed(ConfigMap::new("ns", "app-config"));
        store.set_latency(Duration::from_secs(30));
        let timed = TimedStore::new(store, Duration::from_secs(5));

        let err = timed
            .get::<ConfigMap>("ns", "app-config")
            .await
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(matches!(
            err,
            StorageError::Timeout {
                operation: "get",
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let store = MemoryObjectStore::new();
        store.seed(ConfigMap::new("ns", "app-config").with_entry("version", "v1"));
        store.set_latency(Duration::from_millis(10));
        let timed = TimedStore::new(store, Duration::from_secs(5));

        let cm: ConfigMap = timed.get("ns", "app-config").await.unwrap();
        assert_eq!(cm.data["version"], "v1");
        assert_eq!(timed.deadline(), Duration::from_secs(5));
    }
}
