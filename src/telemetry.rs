//! Tracing subscriber setup for the `mend` binary.
//!
//! Call [`init_tracing`] once at startup. Respects `RUST_LOG` for
//! fine-grained filtering; falls back to the supplied level otherwise.
//! Safe to call more than once — the global subscriber can only be set
//! once per process and later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// When `json` is true, logs are emitted as newline-delimited JSON so run
/// output can feed a log pipeline; otherwise a human-readable fmt layer is
/// used. Either way logs go to stderr, keeping stdout free for the patch.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
