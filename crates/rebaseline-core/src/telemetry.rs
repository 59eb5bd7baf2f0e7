//! Centralised tracing initialisation for the rebaseline binaries.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting.
//!
//! Log lines go to stderr: the internal subcommands print their change set
//! on stdout and the orchestrator parses it from there.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for a `blink-rebaseline` process.
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, every line is
/// a JSON object. A subscriber that is already installed is left in place.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(env_filter);
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        registry.with(stderr.json()).try_init()
    } else {
        registry.with(stderr).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
