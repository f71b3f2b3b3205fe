//! kube-runtime controller wiring.
//!
//! The watched ConfigMap is the only reconcile key. BuildConfig and
//! DeploymentConfig events in the namespace map back onto it, so a manual
//! edit of a managed object triggers a pass the same way a version change
//! does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use appdeployer_core::{DesiredStateSource, ReconcileError, ReconcileOutcome, Reconciler};
use appdeployer_state::{api_resource, ObjectKey, ObjectStore, ResourceKind};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DynamicObject};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Per-key retry delays: base doubled per consecutive failure, capped.
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure of `key` and return how long to wait before retrying.
    pub fn next(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        self.delay(*count)
    }

    pub fn reset(&self, key: &ObjectKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

pub struct Context<S, D> {
    reconciler: Reconciler<S, D>,
    backoff: Backoff,
}

impl<S, D> Context<S, D> {
    pub fn new(reconciler: Reconciler<S, D>) -> Self {
        Self {
            reconciler,
            backoff: Backoff::default(),
        }
    }
}

fn object_key(config_map: &ConfigMap) -> ObjectKey {
    ObjectKey::new(
        config_map.namespace().unwrap_or_default(),
        config_map.name_any(),
    )
}

/// Translate a pass outcome for the controller. Converged and fatal passes
/// wait for the next change; a retryable one goes to [`error_policy`].
pub fn settle(key: &ObjectKey, outcome: ReconcileOutcome) -> Result<Action, ReconcileError> {
    match outcome {
        ReconcileOutcome::Converged(report) => {
            debug!(key = %key, writes = report.writes(), "pass converged");
            Ok(Action::await_change())
        }
        ReconcileOutcome::Fatal(report) => {
            error!(
                key = %key,
                skipped = report.skipped().count(),
                "reconcile left objects that need manual repair; not retrying"
            );
            Ok(Action::await_change())
        }
        ReconcileOutcome::Retry(err) => Err(err),
    }
}

pub async fn reconcile<S, D>(
    config_map: Arc<ConfigMap>,
    ctx: Arc<Context<S, D>>,
) -> Result<Action, ReconcileError>
where
    S: ObjectStore,
    D: DesiredStateSource,
{
    let key = object_key(&config_map);
    let action = settle(&key, ctx.reconciler.reconcile(&key).await)?;
    ctx.backoff.reset(&key);
    Ok(action)
}

pub fn error_policy<S, D>(
    config_map: Arc<ConfigMap>,
    err: &ReconcileError,
    ctx: Arc<Context<S, D>>,
) -> Action {
    let key = object_key(&config_map);
    let delay = ctx.backoff.next(&key);
    warn!(
        key = %key,
        class = %err.class(),
        error = %err,
        retry_in_ms = delay.as_millis() as u64,
        "reconcile will be retried"
    );
    Action::requeue(delay)
}

/// Reference every definition event is mapped onto.
pub fn watched_ref(watched: &ObjectKey) -> ObjectRef<ConfigMap> {
    ObjectRef::new(&watched.name).within(&watched.namespace)
}

/// Run the controller until SIGTERM or ctrl-c. Passes in flight finish
/// before this returns.
pub async fn run<S, D>(
    client: Client,
    watched: ObjectKey,
    reconciler: Reconciler<S, D>,
    workers: u16,
) where
    S: ObjectStore + 'static,
    D: DesiredStateSource + 'static,
{
    let namespace = watched.namespace.clone();
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
    let by_name = watcher::Config::default().fields(&format!("metadata.name={}", watched.name));
    let definitions = |kind: ResourceKind| {
        let resource = api_resource(kind);
        let api = Api::<DynamicObject>::namespaced_with(client.clone(), &namespace, &resource);
        (api, resource)
    };
    let (build_configs, build_config_resource) = definitions(ResourceKind::BuildConfig);
    let (deployments, deployment_resource) = definitions(ResourceKind::DeploymentConfig);

    let target = watched_ref(&watched);
    let on_build_config = {
        let target = target.clone();
        move |_: DynamicObject| Some(target.clone())
    };
    let on_deployment = move |_: DynamicObject| Some(target.clone());

    info!(watched = %watched, workers, "controller started");
    Controller::new(config_maps, by_name)
        .with_config(controller::Config::default().concurrency(workers))
        .watches_with(
            build_configs,
            build_config_resource,
            watcher::Config::default(),
            on_build_config,
        )
        .watches_with(
            deployments,
            deployment_resource,
            watcher::Config::default(),
            on_deployment,
        )
        .shutdown_on_signal()
        .run(
            reconcile::<S, D>,
            error_policy::<S, D>,
            Arc::new(Context::new(reconciler)),
        )
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(object = %object, ?action, "reconciled"),
                Err(err) => warn!(error = %err, "controller event failed"),
            }
        })
        .await;
    info!("controller stopped");
}
