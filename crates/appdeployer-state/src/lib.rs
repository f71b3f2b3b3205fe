//! AppDeployer-State: Resource Model and Object Stores
//!
//! This crate is the persistence layer of AppDeployer. It owns the typed
//! view of the OpenShift resources the reconciler touches and every way of
//! reading and writing them.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: faithful resource shapes, optimistic concurrency, error taxonomy.
//!
//! ## Key Components
//!
//! - `ObjectStore`: typed get/list/create/update with compare-and-update semantics
//! - `MemoryObjectStore`: journaled in-memory fake with fault injection
//! - `KubeObjectStore`: `kube::Client`-backed store for a Kubernetes/OpenShift API server
//! - `TimedStore`: per-call deadline decorator

pub mod cluster;
mod error;
pub mod fakes;
pub mod model;
pub mod store;
pub mod timeout;

pub use error::{ErrorClass, StorageError};
pub use cluster::{api_resource, KubeObjectStore};
pub use model::{
    Build, BuildConfig, BuildConfigSpec, BuildConfigStatus, BuildOutput, BuildSource, BuildSpec,
    BuildTriggerCause, CommonSpec, ConfigMap, DeploymentConfig, DeploymentConfigSpec,
    DeploymentTriggerPolicy, GitBuildSource, ImageChangeParams, ObjectKey, ObjectMeta,
    ObjectReference, OwnerReference, ResourceKind,
};
pub use store::{ObjectStore, Resource, StorageResult};
pub use timeout::TimedStore;
