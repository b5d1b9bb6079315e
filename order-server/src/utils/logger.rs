//! Logging Infrastructure
//!
//! Console output always; a daily rolling JSON file when a log directory is
//! given. `RUST_LOG` overrides the configured level.

use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Default filter when neither `RUST_LOG` nor a level is configured
pub const DEFAULT_FILTER: &str = "order_server=info,tower_http=info";

/// Build the filter directive for a bare level such as `debug`
fn filter_for(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("order_server={level},shared={level},tower_http={level}")
    }
}

/// Initialize the logger (console only, default filter)
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file(None, false, None)
}

/// Initialize the logging system
///
/// * `level` - `info`, `debug`, or a full filter directive
/// * `json_format` - JSON console output (production)
/// * `log_dir` - daily rotating `order-server.*` files, only used if the directory exists
pub fn init_logger_with_file(
    level: Option<&str>,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let directive = level.map(filter_for).unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_layer = log_dir
        .map(Path::new)
        .filter(|dir| dir.is_dir())
        .map(|dir| {
            let appender = tracing_appender::rolling::daily(dir, "order-server");
            fmt::layer()
                .json()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(appender))
                .boxed()
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logger: {e}"))?;

    if let Some(dir) = log_dir
        && !Path::new(dir).is_dir()
    {
        tracing::warn!(log_dir = dir, "Log directory does not exist, file logging disabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_level() {
        assert_eq!(
            filter_for("debug"),
            "order_server=debug,shared=debug,tower_http=debug"
        );
        assert_eq!(filter_for("order_server=trace"), "order_server=trace");
    }
}
