use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

const DEFAULT_FILTER: &str = "cadence=info,cadence_library=info";
const VERBOSE_FILTER: &str = "cadence=debug,cadence_library=debug,cadence_inventory=debug,cadence_storage=debug";

/// Directives used when `RUST_LOG` is unset.
fn fallback_directives(configured: Option<&str>, verbose: bool) -> &str {
    match (configured, verbose) {
        (_, true) => VERBOSE_FILTER,
        (Some(configured), false) => configured,
        (None, false) => DEFAULT_FILTER,
    }
}

/// Install the global subscriber, writing human-readable logs to stderr so
/// that stdout only carries command output.
pub fn init(configured: Option<&str>, verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback_directives(configured, verbose)).or_raise(|| ErrorKind::Logging)?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}
