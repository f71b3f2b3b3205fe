//! AppDeployer Core Library
//!
//! Converges OpenShift BuildConfigs and DeploymentConfigs onto a single
//! desired version read from a watched object.
//!
//! ## Layer 1 - Reconciliation
//!
//! - `DesiredStateSource` / `ConfigMapSource`: where the desired version comes from
//! - `BuildSynchronizer`: retags git BuildConfigs and starts a Build per change
//! - `DeploymentTriggerSynchronizer`: retags DeploymentConfig image-change triggers
//! - `Reconciler`: runs one pass per change notification and classifies the outcome

pub mod build_sync;
pub mod deploy_sync;
pub mod desired;
pub mod error;
pub mod image;
pub mod reconcile;
pub mod report;
pub mod telemetry;

pub use build_sync::{
    build_name, new_build, requested_build, retarget_build_config, BuildSynchronizer,
    REQUESTED_BUILD_ANNOTATION,
};
pub use deploy_sync::{retag_triggers, DeploymentTriggerSynchronizer};
pub use desired::{extract_desired_version, ConfigMapSource, DesiredStateSource, DesiredVersion};
pub use error::{ReconcileError, Result};
pub use image::ImageRef;
pub use reconcile::{PassReport, ReconcileOutcome, Reconciler};
pub use report::{SkippedObject, SyncReport};
pub use telemetry::{default_filter, init_tracing};
