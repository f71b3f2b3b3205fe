//! Typed resource model
//!
//! These types mirror the JSON shape the API server speaks (camelCase fields,
//! `metadata` envelope). Only the fields the reconciler reads or writes are
//! modelled explicitly; everything else is carried through `extra` maps so a
//! read-modify-write cycle never drops data owned by other actors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Namespaced object identity, rendered as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The resource collections this system reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    BuildConfig,
    Build,
    DeploymentConfig,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::BuildConfig => "BuildConfig",
            ResourceKind::Build => "Build",
            ResourceKind::DeploymentConfig => "DeploymentConfig",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "v1",
            ResourceKind::BuildConfig | ResourceKind::Build => "build.openshift.io/v1",
            ResourceKind::DeploymentConfig => "apps.openshift.io/v1",
        }
    }

    /// API group; empty for the core group.
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "",
            ResourceKind::BuildConfig | ResourceKind::Build => "build.openshift.io",
            ResourceKind::DeploymentConfig => "apps.openshift.io",
        }
    }

    pub fn version(&self) -> &'static str {
        "v1"
    }

    /// Lowercase plural used in REST paths.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::BuildConfig => "buildconfigs",
            ResourceKind::Build => "builds",
            ResourceKind::DeploymentConfig => "deploymentconfigs",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Standard object metadata.
///
/// `resource_version` is the optimistic-concurrency token: an update is only
/// accepted when it matches the version currently stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Back-reference used by the store for cascading deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

/// Reference to another object by kind and name (e.g. an `ImageStreamTag`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectReference {
    pub fn image_stream_tag(name: impl Into<String>) -> Self {
        Self {
            kind: "ImageStreamTag".to_string(),
            name: name.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigMap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// BuildConfig / Build
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitBuildSource {
    #[serde(default)]
    pub uri: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSource {
    #[serde(default, rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitBuildSource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildSource {
    pub const GIT: &'static str = "Git";

    pub fn git(uri: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            source_type: Self::GIT.to_string(),
            git: Some(GitBuildSource {
                uri: uri.into(),
                git_ref: Some(git_ref.into()),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    pub fn is_git(&self) -> bool {
        self.source_type == Self::GIT
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ObjectReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The part of a build definition that is copied verbatim into every build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default)]
    pub source: BuildSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Value>,
    #[serde(default)]
    pub output: BuildOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_commit: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_deadline_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "mountTrustedCA")]
    pub mount_trusted_ca: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    #[serde(flatten)]
    pub common: CommonSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_builds_history_limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_builds_history_limit: Option<i32>,
    /// Spec fields not claimed by `common` or the fields above. Declared
    /// after `common` so it only receives what `common` left behind.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigStatus {
    /// Number of the most recently instantiated build.
    #[serde(default)]
    pub last_version: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Definition of how to produce a versioned image from a source repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BuildConfigSpec,
    #[serde(default)]
    pub status: BuildConfigStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildConfig {
    /// A git-sourced definition whose output is pushed to `output_image`.
    pub fn git(
        namespace: impl Into<String>,
        name: impl Into<String>,
        uri: impl Into<String>,
        git_ref: impl Into<String>,
        output_image: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: BuildConfigSpec {
                common: CommonSpec {
                    source: BuildSource::git(uri, git_ref),
                    output: BuildOutput {
                        to: Some(ObjectReference::image_stream_tag(output_image)),
                        extra: Map::new(),
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
            status: BuildConfigStatus::default(),
            extra: Map::new(),
        }
    }

    pub fn with_last_version(mut self, last_version: i64) -> Self {
        self.status.last_version = last_version;
        self
    }

    /// Name of the output image (`repository:tag`), if an output is set.
    pub fn output_image(&self) -> Option<&str> {
        self.spec.common.output.to.as_ref().map(|to| to.name.as_str())
    }

    pub fn git_ref(&self) -> Option<&str> {
        self.spec
            .common
            .source
            .git
            .as_ref()
            .and_then(|git| git.git_ref.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildTriggerCause {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(flatten)]
    pub common: CommonSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_by: Vec<BuildTriggerCause>,
}

/// One immutable, numbered execution of a [`BuildConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BuildSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

// ---------------------------------------------------------------------------
// DeploymentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_names: Vec<String>,
    #[serde(default)]
    pub from: ObjectReference,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    #[serde(default, rename = "type")]
    pub trigger_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<ImageChangeParams>,
}

impl DeploymentTriggerPolicy {
    pub const IMAGE_CHANGE: &'static str = "ImageChange";
    pub const CONFIG_CHANGE: &'static str = "ConfigChange";

    pub fn image_change(image: impl Into<String>) -> Self {
        Self {
            trigger_type: Self::IMAGE_CHANGE.to_string(),
            image_change_params: Some(ImageChangeParams {
                automatic: Some(true),
                from: ObjectReference::image_stream_tag(image),
                ..Default::default()
            }),
        }
    }

    pub fn config_change() -> Self {
        Self {
            trigger_type: Self::CONFIG_CHANGE.to_string(),
            image_change_params: None,
        }
    }

    /// Parameters of an image-change trigger; `None` for every other trigger type.
    pub fn image_change_params(&self) -> Option<&ImageChangeParams> {
        if self.trigger_type != Self::IMAGE_CHANGE {
            return None;
        }
        self.image_change_params.as_ref()
    }

    pub fn image_change_params_mut(&mut self) -> Option<&mut ImageChangeParams> {
        if self.trigger_type != Self::IMAGE_CHANGE {
            return None;
        }
        self.image_change_params.as_mut()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfigSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<DeploymentTriggerPolicy>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentConfigSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl DeploymentConfig {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Default::default()
        }
    }

    pub fn with_trigger(mut self, trigger: DeploymentTriggerPolicy) -> Self {
        self.spec.triggers.push(trigger);
        self
    }

    /// Image names referenced by the image-change triggers, in trigger order.
    pub fn image_trigger_names(&self) -> Vec<&str> {
        self.spec
            .triggers
            .iter()
            .filter_map(|t| t.image_change_params())
            .map(|p| p.from.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_version_joins_group_and_version() {
        for kind in [
            ResourceKind::ConfigMap,
            ResourceKind::BuildConfig,
            ResourceKind::Build,
            ResourceKind::DeploymentConfig,
        ] {
            let joined = if kind.group().is_empty() {
                kind.version().to_string()
            } else {
                format!("{}/{}", kind.group(), kind.version())
            };
            assert_eq!(kind.api_version(), joined);
        }
        assert_eq!(ResourceKind::Build.plural(), "builds");
    }

    #[test]
    fn build_config_decodes_api_shape_and_keeps_unknown_fields() {
        let raw = json!({
            "apiVersion": "build.openshift.io/v1",
            "kind": "BuildConfig",
            "metadata": {
                "name": "api",
                "namespace": "prod",
                "resourceVersion": "41",
                "labels": {"app": "api"},
                "generation": 7
            },
            "spec": {
                "runPolicy": "Serial",
                "source": {
                    "type": "Git",
                    "git": {"uri": "https://example.com/api.git", "ref": "v2"},
                    "contextDir": "svc"
                },
                "strategy": {"type": "Docker", "dockerStrategy": {}},
                "output": {"to": {"kind": "ImageStreamTag", "name": "registry/api:v2"}}
            },
            "status": {"lastVersion": 5}
        });

        let bc: BuildConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(bc.metadata.resource_version.as_deref(), Some("41"));
        assert!(bc.spec.common.source.is_git());
        assert_eq!(bc.git_ref(), Some("v2"));
        assert_eq!(bc.output_image(), Some("registry/api:v2"));
        assert_eq!(bc.status.last_version, 5);
        assert_eq!(bc.spec.run_policy.as_deref(), Some("Serial"));

        let back = serde_json::to_value(&bc).unwrap();
        assert_eq!(back["metadata"]["generation"], json!(7));
        assert_eq!(back["spec"]["source"]["contextDir"], json!("svc"));
        assert_eq!(back["spec"]["strategy"]["type"], json!("Docker"));
        assert_eq!(back["spec"]["source"]["git"]["ref"], json!("v2"));
    }

    #[test]
    fn build_config_keeps_unknown_spec_and_top_level_fields() {
        let raw = json!({
            "metadata": {"name": "api", "namespace": "prod"},
            "spec": {
                "source": {"type": "Git", "git": {"uri": "https://example.com/api.git"}},
                "runPolicy": "Serial",
                "nodeSelector": {"zone": "a"},
                "buildArgs": [{"name": "MODE", "value": "release"}]
            },
            "status": {"lastVersion": 2},
            "x-annotation-sidecar": {"owner": "ops"}
        });

        let bc: BuildConfig = serde_json::from_value(raw).unwrap();
        assert!(bc.spec.extra.contains_key("buildArgs"));
        assert!(!bc.spec.extra.contains_key("nodeSelector"));
        assert!(!bc.spec.extra.contains_key("source"));
        assert!(!bc.spec.extra.contains_key("runPolicy"));
        assert!(bc.extra.contains_key("x-annotation-sidecar"));

        let back = serde_json::to_value(&bc).unwrap();
        assert_eq!(back["spec"]["buildArgs"][0]["value"], json!("release"));
        assert_eq!(back["spec"]["nodeSelector"]["zone"], json!("a"));
        assert_eq!(back["x-annotation-sidecar"]["owner"], json!("ops"));
    }

    #[test]
    fn only_image_change_triggers_expose_params() {
        let dc = DeploymentConfig::new("prod", "api-deploy")
            .with_trigger(DeploymentTriggerPolicy::config_change())
            .with_trigger(DeploymentTriggerPolicy::image_change("api:v2"));

        assert_eq!(dc.image_trigger_names(), vec!["api:v2"]);

        let mut mislabelled = DeploymentTriggerPolicy::image_change("api:v2");
        mislabelled.trigger_type = DeploymentTriggerPolicy::CONFIG_CHANGE.to_string();
        assert!(mislabelled.image_change_params().is_none());
    }

    #[test]
    fn object_key_displays_namespace_first() {
        assert_eq!(ObjectKey::new("prod", "api").to_string(), "prod/api");
    }
}
