//! Desired state extraction.
//!
//! The desired version is read from one well-known object. The
//! [`DesiredStateSource`] trait keeps the synchronizers independent of where
//! that object lives; [`ConfigMapSource`] is the ConfigMap-backed source.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use appdeployer_state::{ConfigMap, ObjectKey, ObjectStore, StorageResult};

/// Version every managed resource should converge to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredVersion {
    Defined(String),
    /// The key is absent from the source object.
    Undefined,
}

impl DesiredVersion {
    /// Tag written into managed resources.
    ///
    /// `Undefined` yields the empty string, so an absent key retags every
    /// managed image to `repository:` and points git refs at `""`.
    pub fn tag(&self) -> &str {
        match self {
            DesiredVersion::Defined(version) => version,
            DesiredVersion::Undefined => "",
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, DesiredVersion::Defined(_))
    }

    /// `(version, present)` pair.
    pub fn into_parts(self) -> (String, bool) {
        match self {
            DesiredVersion::Defined(version) => (version, true),
            DesiredVersion::Undefined => (String::new(), false),
        }
    }
}

impl fmt::Display for DesiredVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredVersion::Defined(version) => f.write_str(version),
            DesiredVersion::Undefined => f.write_str("<undefined>"),
        }
    }
}

/// Look up `key` in a ConfigMap. All other entries are ignored.
pub fn extract_desired_version(config: &ConfigMap, key: &str) -> DesiredVersion {
    match config.data.get(key) {
        Some(version) => DesiredVersion::Defined(version.clone()),
        None => DesiredVersion::Undefined,
    }
}

/// Capability to resolve the desired version for a change notification.
#[async_trait]
pub trait DesiredStateSource: Send + Sync {
    /// Resolve the desired version for the object named by `key`.
    ///
    /// Returns `Ok(None)` when `key` does not name the watched object or the
    /// watched object no longer exists; both mean "nothing to do".
    async fn resolve(&self, key: &ObjectKey) -> StorageResult<Option<DesiredVersion>>;

    /// Name of the watched object; the daemon keys every pass on it.
    fn watched_name(&self) -> &str;
}

/// Reads the desired version from `data[key]` of the ConfigMap called `name`.
pub struct ConfigMapSource<S> {
    store: Arc<S>,
    name: String,
    key: String,
}

impl<S: ObjectStore> ConfigMapSource<S> {
    pub fn new(store: Arc<S>, name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<S: ObjectStore> DesiredStateSource for ConfigMapSource<S> {
    async fn resolve(&self, key: &ObjectKey) -> StorageResult<Option<DesiredVersion>> {
        if key.name != self.name {
            debug!(%key, watched = %self.name, "not the watched config map");
            return Ok(None);
        }

        match self
            .store
            .get::<ConfigMap>(&key.namespace, &key.name)
            .await
        {
            Ok(config) => Ok(Some(extract_desired_version(&config, &self.key))),
            Err(err) if err.is_not_found() => {
                debug!(%key, "watched config map is gone");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn watched_name(&self) -> &str {
        &self.name
    }
}
