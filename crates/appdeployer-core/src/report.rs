//! Per-pass bookkeeping shared by the synchronizers.

use appdeployer_state::{ObjectKey, ResourceKind};
use tracing::{error, info, warn};

use crate::error::ReconcileError;

/// What happened to one managed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ObjectAction {
    /// Already at the desired version; nothing written.
    Converged,
    /// Rewritten and persisted.
    Updated,
    /// Definition rewritten and a build instance created.
    UpdatedAndCreated { build: ObjectKey },
    /// Definition rewritten; the build instance was already there.
    UpdatedBuildExisted { build: ObjectKey },
    /// Definition already converged; the build its last rewrite requested
    /// was missing and has now been created.
    CreatedMissingBuild { build: ObjectKey },
}

/// An object left untouched because of its own malformed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub kind: ResourceKind,
    pub key: ObjectKey,
    pub error: ReconcileError,
}

/// Outcome of one synchronizer over one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub converged: Vec<ObjectKey>,
    pub updated: Vec<ObjectKey>,
    /// Build instances created during the pass.
    pub created: Vec<ObjectKey>,
    pub skipped: Vec<SkippedObject>,
    /// Objects deleted between list and write.
    pub vanished: Vec<ObjectKey>,
}

impl SyncReport {
    /// Store writes this report accounts for.
    pub fn writes(&self) -> usize {
        self.updated.len() + self.created.len()
    }

    /// Fold one object's result in. Returns `Err` when the error must abort
    /// the remaining objects (any store failure other than not-found).
    pub(crate) fn absorb(
        &mut self,
        kind: ResourceKind,
        key: ObjectKey,
        result: Result<ObjectAction, ReconcileError>,
    ) -> Result<(), ReconcileError> {
        match result {
            Ok(ObjectAction::Converged) => self.converged.push(key),
            Ok(ObjectAction::Updated) => {
                info!(%kind, %key, "updated to desired version");
                self.updated.push(key);
            }
            Ok(ObjectAction::UpdatedAndCreated { build }) => {
                info!(%kind, %key, %build, "updated and started build");
                self.updated.push(key);
                self.created.push(build);
            }
            Ok(ObjectAction::UpdatedBuildExisted { build }) => {
                info!(%kind, %key, %build, "updated; build already exists");
                self.updated.push(key);
            }
            Ok(ObjectAction::CreatedMissingBuild { build }) => {
                info!(%kind, %key, %build, "started build left missing by an earlier pass");
                self.converged.push(key);
                self.created.push(build);
            }
            Err(err) if err.is_object_local() => {
                warn!(%kind, %key, class = %err.class(), error = %err, "skipping object");
                self.skipped.push(SkippedObject {
                    kind,
                    key,
                    error: err,
                });
            }
            Err(err) if err.is_not_found() => {
                info!(%kind, %key, "object vanished during pass");
                self.vanished.push(key);
            }
            Err(err) => {
                error!(%kind, %key, class = %err.class(), error = %err, "store failure");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdeployer_state::StorageError;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ns", name)
    }

    #[test]
    fn absorb_sorts_results() {
        let mut report = SyncReport::default();
        let kind = ResourceKind::BuildConfig;

        report
            .absorb(kind, key("a"), Ok(ObjectAction::Converged))
            .unwrap();
        report
            .absorb(
                kind,
                key("b"),
                Ok(ObjectAction::UpdatedAndCreated { build: key("b-2") }),
            )
            .unwrap();
        report
            .absorb(
                kind,
                key("c"),
                Err(ReconcileError::MalformedImage {
                    reference: "c".into(),
                    reason: "missing tag separator",
                }),
            )
            .unwrap();
        report
            .absorb(
                kind,
                key("d"),
                Err(StorageError::NotFound { kind, key: key("d") }.into()),
            )
            .unwrap();

        report
            .absorb(
                kind,
                key("e"),
                Ok(ObjectAction::CreatedMissingBuild { build: key("e-4") }),
            )
            .unwrap();

        assert_eq!(report.converged, vec![key("a"), key("e")]);
        assert_eq!(report.updated, vec![key("b")]);
        assert_eq!(report.created, vec![key("b-2"), key("e-4")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.vanished, vec![key("d")]);
        assert_eq!(report.writes(), 3);
    }

    #[test]
    fn absorb_aborts_on_store_failure() {
        let mut report = SyncReport::default();
        let kind = ResourceKind::DeploymentConfig;
        let err = StorageError::Conflict { kind, key: key("a") };

        let result = report.absorb(kind, key("a"), Err(err.clone().into()));

        assert_eq!(result, Err(ReconcileError::Storage(err)));
    }
}
