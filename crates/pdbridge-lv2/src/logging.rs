//! Opt-in log output for plugins running inside a host.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `PDBRIDGE_LOG=debug`.
pub const LOG_ENV: &str = "PDBRIDGE_LOG";

static INIT: Once = Once::new();

/// Install a stderr subscriber when [`LOG_ENV`] is set.
///
/// Hosts own the process, so nothing is installed otherwise, and an
/// already-installed global subscriber is left alone.
pub fn init() {
    INIT.call_once(|| {
        if std::env::var_os(LOG_ENV).is_none() {
            return;
        }
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
