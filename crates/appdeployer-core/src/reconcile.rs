//! Reconcile orchestration.
//!
//! One pass per change notification: resolve the desired version, converge
//! build definitions, then converge deployment triggers. The outcome tells
//! the event source whether to forget the key or redeliver it.
//!
//! Every step re-derives drift from what the store holds, so a pass can be
//! interrupted at any store call and simply run again.

use std::sync::Arc;

use appdeployer_state::{ObjectKey, ObjectStore};
use tracing::{info, instrument, warn};

use crate::build_sync::BuildSynchronizer;
use crate::deploy_sync::DeploymentTriggerSynchronizer;
use crate::desired::{ConfigMapSource, DesiredStateSource, DesiredVersion};
use crate::error::{ReconcileError, Result};
use crate::report::{SkippedObject, SyncReport};

/// Everything one pass observed and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub key: ObjectKey,
    /// `None` when the key was not the watched object (or it was gone).
    pub desired: Option<DesiredVersion>,
    pub builds: SyncReport,
    pub deployments: SyncReport,
}

impl PassReport {
    fn new(key: ObjectKey) -> Self {
        Self {
            key,
            desired: None,
            builds: SyncReport::default(),
            deployments: SyncReport::default(),
        }
    }

    pub fn writes(&self) -> usize {
        self.builds.writes() + self.deployments.writes()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedObject> {
        self.builds.skipped.iter().chain(self.deployments.skipped.iter())
    }
}

/// Signal handed back to the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the next external change.
    Converged(PassReport),
    /// Transient failure; redeliver the key with backoff.
    Retry(ReconcileError),
    /// The pass finished but skipped malformed objects. Retrying will not
    /// fix them; an operator has to.
    Fatal(PassReport),
}

impl ReconcileOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ReconcileOutcome::Converged(_))
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, ReconcileOutcome::Retry(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileOutcome::Fatal(_))
    }

    pub fn report(&self) -> Option<&PassReport> {
        match self {
            ReconcileOutcome::Converged(report) | ReconcileOutcome::Fatal(report) => Some(report),
            ReconcileOutcome::Retry(_) => None,
        }
    }
}

pub struct Reconciler<S, D> {
    source: D,
    builds: BuildSynchronizer<S>,
    deployments: DeploymentTriggerSynchronizer<S>,
}

impl<S: ObjectStore> Reconciler<S, ConfigMapSource<S>> {
    /// Reconciler driven by `data[config_key]` of the ConfigMap `config_name`.
    pub fn for_config_map(
        store: Arc<S>,
        config_name: impl Into<String>,
        config_key: impl Into<String>,
    ) -> Self {
        let source = ConfigMapSource::new(store.clone(), config_name, config_key);
        Self::new(store, source)
    }
}

impl<S: ObjectStore, D: DesiredStateSource> Reconciler<S, D> {
    pub fn new(store: Arc<S>, source: D) -> Self {
        Self {
            source,
            builds: BuildSynchronizer::new(store.clone()),
            deployments: DeploymentTriggerSynchronizer::new(store),
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// Run one pass for `key` and classify the result.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcileOutcome {
        match self.run_pass(key).await {
            Ok(report) => {
                let skipped = report.skipped().count();
                if skipped > 0 {
                    for object in report.skipped() {
                        warn!(
                            kind = %object.kind,
                            object = %object.key,
                            class = %object.error.class(),
                            error = %object.error,
                            "object needs operator attention"
                        );
                    }
                    return ReconcileOutcome::Fatal(report);
                }
                if report.desired.is_some() {
                    info!(writes = report.writes(), "pass converged");
                }
                ReconcileOutcome::Converged(report)
            }
            Err(err) => {
                warn!(class = %err.class(), error = %err, "pass aborted; will retry");
                ReconcileOutcome::Retry(err)
            }
        }
    }

    /// Run one pass for `key`.
    ///
    /// Builds complete before deployments start. Any store error other than
    /// not-found aborts the pass.
    pub async fn run_pass(&self, key: &ObjectKey) -> Result<PassReport> {
        let mut report = PassReport::new(key.clone());

        let desired = match self.source.resolve(key).await {
            Ok(Some(desired)) => desired,
            Ok(None) => return Ok(report),
            Err(err) if err.is_not_found() => return Ok(report),
            Err(err) => return Err(err.into()),
        };
        if !desired.is_defined() {
            warn!("desired version key is absent; propagating an empty tag to managed resources");
        }
        info!(desired = %desired, "reconciling namespace");

        report.builds = self.builds.sync(&key.namespace, &desired).await?;
        report.deployments = self.deployments.sync(&key.namespace, &desired).await?;
        report.desired = Some(desired);
        Ok(report)
    }
}
