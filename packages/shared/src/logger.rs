//! Logging setup for the quizsync binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Library crates whose log output follows the default level.
const LIBRARY_TARGETS: &[&str] = &["quizsync_client", "quizsync_shared"];

/// Build the default filter directives used when `RUST_LOG` is not set.
///
/// Binary names are normalized the same way Rust normalizes crate names
/// into log targets (`-` becomes `_`). A binary sharing its name with a
/// library crate is listed once.
pub fn default_directives(binary_name: &str, default_log_level: &str) -> String {
    let mut directives: Vec<String> = LIBRARY_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, default_log_level))
        .collect();
    let binary_target = binary_name.replace('-', "_");
    if !LIBRARY_TARGETS.contains(&binary_target.as_str()) {
        directives.push(format!("{}={}", binary_target, default_log_level));
    }
    directives.join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "quizsync-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use quizsync_shared::logger::setup_logger;
///
/// setup_logger("quizsync-client", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
