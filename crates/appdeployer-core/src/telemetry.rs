//! Log setup for `appdeployerd`.
//!
//! The daemon's logging contract:
//!
//! * `RUST_LOG`, when set, is the whole filter (e.g. `RUST_LOG=kube=debug,info`
//!   to see the client's requests).
//! * Otherwise `--verbose` raises the AppDeployer crates to `debug` while the
//!   Kubernetes client stack stays at `info`; without it everything logs at
//!   `info`.
//! * `--json` switches to one JSON object per line for the cluster log
//!   collector. Event fields sit at the top level; the current span's fields
//!   (`key`, `kind`, `desired`) are under `span`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const CRATES: [&str; 3] = ["appdeployerd", "appdeployer_core", "appdeployer_state"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> String {
    if !verbose {
        return "info".to_string();
    }
    let mut directives = vec!["info".to_string()];
    directives.extend(CRATES.iter().map(|name| format!("{name}=debug")));
    directives.join(",")
}

/// Install the global subscriber. Only the first call in a process takes
/// effect.
pub fn init_tracing(json: bool, verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
