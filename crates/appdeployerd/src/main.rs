//! appdeployerd - version roll-forward daemon
//!
//! Watches one ConfigMap key and keeps every git BuildConfig and every
//! DeploymentConfig image trigger in its namespace on that version.

mod controller;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use appdeployer_core::{init_tracing, DesiredStateSource, Reconciler};
use appdeployer_state::{KubeObjectStore, ObjectKey, TimedStore};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "appdeployerd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Roll OpenShift builds and deployments onto a configured version", long_about = None)]
struct Cli {
    /// ConfigMap holding the desired version
    #[arg(long, env = "APPDEPLOYER_CONFIGMAP")]
    configmap: String,

    /// Key inside the ConfigMap whose value is the desired tag
    #[arg(long, env = "APPDEPLOYER_CONFIGKEY")]
    configkey: String,

    /// Namespace to watch and manage
    #[arg(long, env = "APPDEPLOYER_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Concurrent reconcile passes
    #[arg(long, default_value_t = 2)]
    workers: u16,

    /// Deadline for a single API call
    #[arg(long, default_value_t = 10)]
    store_timeout_secs: u64,

    /// Log AppDeployer crates at debug level (ignored when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.verbose);

    let client = kube::Client::try_default()
        .await
        .context("failed to infer Kubernetes client configuration")?;
    info!(
        default_namespace = %client.default_namespace(),
        namespace = %cli.namespace,
        "connected to API server"
    );
    let store = Arc::new(TimedStore::new(
        KubeObjectStore::new(client.clone()),
        Duration::from_secs(cli.store_timeout_secs),
    ));

    let reconciler = Reconciler::for_config_map(store, &cli.configmap, &cli.configkey);
    let watched = ObjectKey::new(&cli.namespace, reconciler.source().watched_name());

    info!(watched = %watched, key = %cli.configkey, "appdeployerd running");
    controller::run(client, watched, reconciler, cli.workers).await;
    info!("appdeployerd stopped");
    Ok(())
}
