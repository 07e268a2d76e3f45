//! Logging setup for boss battle binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Both the client library crate and the binary log at `default_log_level`
/// unless `RUST_LOG` says otherwise.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "bossbattle-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn")
///
/// # Examples
///
/// ```no_run
/// use bossbattle_shared::logger::setup_logger;
///
/// setup_logger("bossbattle-client", "info");
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

/// Build the `EnvFilter` directives used when `RUST_LOG` is unset.
///
/// Crate and binary names are normalized to their module path form
/// (`-` becomes `_`).
pub fn default_directives(binary_name: &str, default_log_level: &str) -> String {
    format!(
        "bossbattle_client={level},bossbattle_shared={level},{bin}={level}",
        level = default_log_level,
        bin = binary_name.replace('-', "_"),
    )
}
