//! Build synchronizer.
//!
//! Drives git-sourced BuildConfigs onto the desired version. A drifted
//! definition gets its output tag and git ref rewritten, its build counter
//! bumped, and a new Build instance created for the new counter value.
//! Non-git definitions are never touched.
//!
//! The definition update and the build creation are two writes. The update
//! records the counter it was made for in [`REQUESTED_BUILD_ANNOTATION`], so
//! a pass that finds the definition already converged can still create a
//! build that a failed create left missing.

use std::collections::BTreeMap;
use std::sync::Arc;

use appdeployer_state::{
    Build, BuildConfig, BuildSpec, BuildTriggerCause, GitBuildSource, ObjectMeta, ObjectStore,
    OwnerReference, Resource, ResourceKind,
};
use tracing::{debug, info, instrument};

use crate::desired::DesiredVersion;
use crate::error::{ReconcileError, Result};
use crate::image::ImageRef;
use crate::report::{ObjectAction, SyncReport};

pub const BUILD_CONFIG_LABEL: &str = "openshift.io/build-config.name";
pub const BUILD_CONFIG_LABEL_DEPRECATED: &str = "buildconfig";
pub const BUILD_RUN_POLICY_LABEL: &str = "openshift.io/build.start-policy";
pub const RUN_POLICY_SERIAL_LATEST_ONLY: &str = "SerialLatestOnly";

pub const BUILD_CONFIG_ANNOTATION: &str = "openshift.io/build-config.name";
pub const BUILD_NUMBER_ANNOTATION: &str = "openshift.io/build.number";
pub const BUILD_POD_NAME_ANNOTATION: &str = "openshift.io/build.pod-name";

/// Set on a definition to the build counter its last rewrite requested.
pub const REQUESTED_BUILD_ANNOTATION: &str = "appdeployer/requested-build";

/// Cause recorded on every build this system starts.
pub const TRIGGER_MESSAGE: &str = "AppDeployer";

/// `<definition>-<counter>`
pub fn build_name(config_name: &str, number: i64) -> String {
    format!("{config_name}-{number}")
}

/// Build instance for the current `status.last_version` of `config`.
///
/// `config` should be the stored copy returned by the update, so the owner
/// reference carries its uid.
pub fn new_build(config: &BuildConfig) -> Build {
    let config_name = config.metadata.name.clone();
    let number = config.status.last_version;
    let name = build_name(&config_name, number);

    let mut labels = config.metadata.labels.clone();
    labels.insert(BUILD_CONFIG_LABEL_DEPRECATED.into(), config_name.clone());
    labels.insert(BUILD_CONFIG_LABEL.into(), config_name.clone());
    labels.insert(
        BUILD_RUN_POLICY_LABEL.into(),
        RUN_POLICY_SERIAL_LATEST_ONLY.into(),
    );

    let annotations = BTreeMap::from([
        (BUILD_CONFIG_ANNOTATION.to_string(), config_name.clone()),
        (BUILD_NUMBER_ANNOTATION.to_string(), number.to_string()),
        (BUILD_POD_NAME_ANNOTATION.to_string(), format!("{name}-build")),
    ]);

    let owner = OwnerReference {
        api_version: BuildConfig::KIND.api_version().to_string(),
        kind: BuildConfig::KIND.as_str().to_string(),
        name: config_name,
        uid: config.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: None,
    };

    Build {
        metadata: ObjectMeta {
            name,
            namespace: config.metadata.namespace.clone(),
            labels,
            annotations,
            owner_references: vec![owner],
            ..Default::default()
        },
        spec: BuildSpec {
            common: config.spec.common.clone(),
            triggered_by: vec![BuildTriggerCause {
                message: TRIGGER_MESSAGE.to_string(),
                ..Default::default()
            }],
        },
        status: None,
    }
}

/// Rewrite `config` in place for `desired`. Returns `false` when it already
/// matches and nothing was changed.
pub fn retarget_build_config(config: &mut BuildConfig, desired: &str) -> Result<bool> {
    let key = config.key();
    let to = config
        .spec
        .common
        .output
        .to
        .as_mut()
        .ok_or(ReconcileError::MissingOutputImage { key })?;
    let image = ImageRef::parse(&to.name)?;
    if image.tag() == desired {
        return Ok(false);
    }

    to.name = image.with_tag(desired).to_string();
    config
        .spec
        .common
        .source
        .git
        .get_or_insert_with(GitBuildSource::default)
        .git_ref = Some(desired.to_string());
    config.status.last_version += 1;
    config.metadata.annotations.insert(
        REQUESTED_BUILD_ANNOTATION.to_string(),
        config.status.last_version.to_string(),
    );
    Ok(true)
}

/// The build counter this system requested for `config`, if the request is
/// still the definition's latest. A counter bumped by anyone else since
/// yields `None`.
pub fn requested_build(config: &BuildConfig) -> Option<i64> {
    config
        .metadata
        .annotations
        .get(REQUESTED_BUILD_ANNOTATION)
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|number| *number == config.status.last_version && *number > 0)
}

pub struct BuildSynchronizer<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> BuildSynchronizer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Converge every git-sourced BuildConfig in `namespace`.
    #[instrument(skip(self, desired), fields(desired = %desired))]
    pub async fn sync(&self, namespace: &str, desired: &DesiredVersion) -> Result<SyncReport> {
        let configs: Vec<BuildConfig> = match self.store.list(namespace).await {
            Ok(configs) => configs,
            Err(err) if err.is_not_found() => return Ok(SyncReport::default()),
            Err(err) => return Err(err.into()),
        };
        let mut report = SyncReport::default();

        for config in configs {
            if !config.spec.common.source.is_git() {
                debug!(
                    key = %config.key(),
                    source = %config.spec.common.source.source_type,
                    "not a git build; leaving alone"
                );
                continue;
            }
            let key = config.key();
            let result = self.sync_one(config, desired.tag()).await;
            report.absorb(ResourceKind::BuildConfig, key, result)?;
        }

        Ok(report)
    }

    async fn sync_one(&self, mut config: BuildConfig, desired: &str) -> Result<ObjectAction> {
        if !retarget_build_config(&mut config, desired)? {
            return self.resume_build(&config).await;
        }

        let stored = self.store.update(&config).await?;
        let build = new_build(&stored);
        let build_key = build.key();

        match self.store.create(&build).await {
            Ok(_) => Ok(ObjectAction::UpdatedAndCreated { build: build_key }),
            Err(err) if err.is_already_exists() => {
                info!(build = %build_key, "build already exists; treating as created");
                Ok(ObjectAction::UpdatedBuildExisted { build: build_key })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create the build a converged definition requested if it is missing.
    async fn resume_build(&self, config: &BuildConfig) -> Result<ObjectAction> {
        let Some(number) = requested_build(config) else {
            return Ok(ObjectAction::Converged);
        };
        let name = build_name(&config.metadata.name, number);
        match self
            .store
            .get::<Build>(&config.metadata.namespace, &name)
            .await
        {
            Ok(_) => return Ok(ObjectAction::Converged),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let build = new_build(config);
        let build_key = build.key();
        match self.store.create(&build).await {
            Ok(_) => Ok(ObjectAction::CreatedMissingBuild { build: build_key }),
            Err(err) if err.is_already_exists() => Ok(ObjectAction::Converged),
            Err(err) => Err(err.into()),
        }
    }
}
