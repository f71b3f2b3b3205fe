//! Deployment trigger synchronizer.
//!
//! Points every image-change trigger of every DeploymentConfig at the
//! desired tag. All stale triggers of one DeploymentConfig are rewritten
//! together and persisted with a single update.

use std::sync::Arc;

use appdeployer_state::{DeploymentConfig, ObjectStore, Resource, ResourceKind};
use tracing::instrument;

use crate::desired::DesiredVersion;
use crate::error::Result;
use crate::image::ImageRef;
use crate::report::{ObjectAction, SyncReport};

/// Retag the stale image-change triggers of `config`; returns how many changed.
///
/// Every trigger is parsed before any is rewritten, so a malformed trigger
/// leaves `config` untouched.
pub fn retag_triggers(config: &mut DeploymentConfig, desired: &str) -> Result<usize> {
    let parsed = config
        .spec
        .triggers
        .iter()
        .map(|trigger| {
            trigger
                .image_change_params()
                .map(|params| ImageRef::parse(&params.from.name))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut changed = 0;
    for (trigger, image) in config.spec.triggers.iter_mut().zip(parsed) {
        let (Some(params), Some(image)) = (trigger.image_change_params_mut(), image) else {
            continue;
        };
        if image.tag() == desired {
            continue;
        }
        params.from.name = image.with_tag(desired).to_string();
        changed += 1;
    }
    Ok(changed)
}

pub struct DeploymentTriggerSynchronizer<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> DeploymentTriggerSynchronizer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Converge the image-change triggers of every DeploymentConfig in `namespace`.
    #[instrument(skip(self, desired), fields(desired = %desired))]
    pub async fn sync(&self, namespace: &str, desired: &DesiredVersion) -> Result<SyncReport> {
        let configs: Vec<DeploymentConfig> = match self.store.list(namespace).await {
            Ok(configs) => configs,
            Err(err) if err.is_not_found() => return Ok(SyncReport::default()),
            Err(err) => return Err(err.into()),
        };
        let mut report = SyncReport::default();

        for config in configs {
            let key = config.key();
            let result = self.sync_one(config, desired.tag()).await;
            report.absorb(ResourceKind::DeploymentConfig, key, result)?;
        }

        Ok(report)
    }

    async fn sync_one(&self, mut config: DeploymentConfig, desired: &str) -> Result<ObjectAction> {
        if retag_triggers(&mut config, desired)? == 0 {
            return Ok(ObjectAction::Converged);
        }
        self.store.update(&config).await?;
        Ok(ObjectAction::Updated)
    }
}
