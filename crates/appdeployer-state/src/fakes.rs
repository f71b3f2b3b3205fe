//! In-memory fake object store (testing only)
//!
//! `MemoryObjectStore` satisfies the [`ObjectStore`] contract without a
//! cluster: objects are kept as JSON, resource versions come from a single
//! monotonically increasing counter, and every call is journaled so tests
//! can assert exactly which reads and writes a reconcile pass performed.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::error::StorageError;
use crate::model::{ObjectKey, ResourceKind};
use crate::store::{ObjectStore, Resource, StorageResult};

/// Store operation, as recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
}

/// One journaled call. `List` entries carry an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub operation: Operation,
    pub kind: ResourceKind,
    pub key: ObjectKey,
}

type Slot = (ResourceKind, String, String);

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<Slot, Value>,
    last_version: u64,
    journal: Vec<JournalEntry>,
    faults: HashMap<(Operation, ResourceKind), VecDeque<StorageError>>,
}

impl Inner {
    fn record(&mut self, operation: Operation, kind: ResourceKind, key: ObjectKey) {
        self.journal.push(JournalEntry {
            operation,
            kind,
            key,
        });
    }

    fn take_fault(&mut self, operation: Operation, kind: ResourceKind) -> Option<StorageError> {
        self.faults
            .get_mut(&(operation, kind))
            .and_then(|queue| queue.pop_front())
    }

    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn insert_new<R: Resource>(&mut self, object: &R) -> StorageResult<R> {
        let key = object.key();
        let slot = (R::KIND, key.namespace.clone(), key.name.clone());
        if self.objects.contains_key(&slot) {
            return Err(StorageError::AlreadyExists { kind: R::KIND, key });
        }

        let mut stored = object.clone();
        let version = self.next_version();
        let meta = stored.metadata_mut();
        meta.resource_version = Some(version);
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Utc::now());
        }

        self.objects.insert(slot, serde_json::to_value(&stored)?);
        Ok(stored)
    }
}

/// In-memory object store keyed by `(kind, namespace, name)`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object as test fixture. Not journaled; assigns uid and version.
    pub fn seed<R: Resource>(&self, object: R) -> R {
        let mut inner = self.inner.lock().unwrap();
        match inner.insert_new(&object) {
            Ok(stored) => stored,
            Err(err) => panic!("seeding {} {} failed: {err}", R::KIND, object.key()),
        }
    }

    /// Read an object without touching the journal.
    pub fn peek<R: Resource>(&self, namespace: &str, name: &str) -> Option<R> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(R::KIND, namespace.to_string(), name.to_string()))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Every object of a kind in a namespace, without touching the journal.
    pub fn peek_all<R: Resource>(&self, namespace: &str) -> Vec<R> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == R::KIND && ns == namespace)
            .filter_map(|(_, value)| serde_json::from_value(value.clone()).ok())
            .collect()
    }

    /// Queue an error returned by the next matching call instead of executing it.
    pub fn fail_next(&self, operation: Operation, kind: ResourceKind, error: StorageError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .faults
            .entry((operation, kind))
            .or_default()
            .push_back(error);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.lock().unwrap().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.inner.lock().unwrap().journal.clear();
    }

    /// Number of journaled calls of one operation.
    pub fn count(&self, operation: Operation) -> usize {
        self.inner
            .lock()
            .unwrap()
            .journal
            .iter()
            .filter(|e| e.operation == operation)
            .count()
    }

    /// Number of journaled calls of one operation against one kind.
    pub fn count_for(&self, operation: Operation, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .journal
            .iter()
            .filter(|e| e.operation == operation && e.kind == kind)
            .count()
    }

    /// Creates plus updates.
    pub fn writes(&self) -> usize {
        self.count(Operation::Create) + self.count(Operation::Update)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get<R: Resource>(&self, namespace: &str, name: &str) -> StorageResult<R> {
        self.delay().await;
        let mut inner = self.inner.lock().unwrap();
        let key = ObjectKey::new(namespace, name);
        inner.record(Operation::Get, R::KIND, key.clone());
        if let Some(err) = inner.take_fault(Operation::Get, R::KIND) {
            return Err(err);
        }

        let value = inner
            .objects
            .get(&(R::KIND, key.namespace.clone(), key.name.clone()))
            .cloned()
            .ok_or(StorageError::NotFound { kind: R::KIND, key })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list<R: Resource>(&self, namespace: &str) -> StorageResult<Vec<R>> {
        self.delay().await;
        let mut inner = self.inner.lock().unwrap();
        inner.record(Operation::List, R::KIND, ObjectKey::new(namespace, ""));
        if let Some(err) = inner.take_fault(Operation::List, R::KIND) {
            return Err(err);
        }

        inner
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == R::KIND && ns == namespace)
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StorageError::from))
            .collect()
    }

    async fn create<R: Resource>(&self, object: &R) -> StorageResult<R> {
        self.delay().await;
        let mut inner = self.inner.lock().unwrap();
        inner.record(Operation::Create, R::KIND, object.key());
        if let Some(err) = inner.take_fault(Operation::Create, R::KIND) {
            return Err(err);
        }
        inner.insert_new(object)
    }

    async fn update<R: Resource>(&self, object: &R) -> StorageResult<R> {
        self.delay().await;
        let mut inner = self.inner.lock().unwrap();
        let key = object.key();
        inner.record(Operation::Update, R::KIND, key.clone());
        if let Some(err) = inner.take_fault(Operation::Update, R::KIND) {
            return Err(err);
        }

        let slot = (R::KIND, key.namespace.clone(), key.name.clone());
        let current: R = match inner.objects.get(&slot) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => return Err(StorageError::NotFound { kind: R::KIND, key }),
        };
        if current.metadata().resource_version != object.metadata().resource_version {
            return Err(StorageError::Conflict { kind: R::KIND, key });
        }

        let mut stored = object.clone();
        let version = inner.next_version();
        let meta = stored.metadata_mut();
        meta.resource_version = Some(version);
        meta.uid = current.metadata().uid.clone();
        meta.creation_timestamp = current.metadata().creation_timestamp;

        inner.objects.insert(slot, serde_json::to_value(&stored)?);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigMap;

    #[tokio::test]
    async fn journal_tracks_reads_and_writes() {
        let store = MemoryObjectStore::new();
        store.seed(ConfigMap::new("ns", "app-config").with_entry("version", "v1"));

        let mut cm: ConfigMap = store.get("ns", "app-config").await.unwrap();
        cm.data.insert("version".into(), "v2".into());
        store.update(&cm).await.unwrap();
        let _: Vec<ConfigMap> = store.list("ns").await.unwrap();

        assert_eq!(store.count(Operation::Get), 1);
        assert_eq!(store.count(Operation::List), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.journal()[1],
            JournalEntry {
                operation: Operation::Update,
                kind: ResourceKind::ConfigMap,
                key: ObjectKey::new("ns", "app-config"),
            }
        );

        store.clear_journal();
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryObjectStore::new();
        store.seed(ConfigMap::new("ns", "app-config"));
        store.fail_next(
            Operation::Get,
            ResourceKind::ConfigMap,
            StorageError::Unavailable("connection reset".into()),
        );

        let first = store.get::<ConfigMap>("ns", "app-config").await;
        assert!(matches!(first, Err(StorageError::Unavailable(_))));
        assert!(store.get::<ConfigMap>("ns", "app-config").await.is_ok());
    }

    #[tokio::test]
    async fn peek_does_not_journal() {
        let store = MemoryObjectStore::new();
        store.seed(ConfigMap::new("ns", "a"));
        store.seed(ConfigMap::new("other", "b"));

        assert!(store.peek::<ConfigMap>("ns", "a").is_some());
        assert_eq!(store.peek_all::<ConfigMap>("ns").len(), 1);
        assert!(store.journal().is_empty());
    }
}
