//! Tracing setup. All diagnostics go to stderr; stdout carries protocol
//! traffic only.

use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Filter used when neither `LOG_LEVEL` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Pick the filter directive: `LOG_LEVEL`, then `RUST_LOG`, then `info`.
/// Blank values count as unset.
pub fn filter_directive(log_level: Option<&str>, rust_log: Option<&str>) -> String {
    [log_level, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Install the global subscriber.
///
/// An unparsable directive falls back to the default filter with a warning
/// instead of aborting startup.
pub fn init_tracing(log_level: Option<&str>, format: LogFormat) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(log_level, rust_log.as_deref());
    let (filter, rejected) = match EnvFilter::try_new(&directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    if let Some(e) = rejected {
        tracing::warn!(directive = %directive, error = %e, "invalid log filter, using 'info'");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_wins() {
        assert_eq!(filter_directive(Some("debug"), Some("trace")), "debug");
    }

    #[test]
    fn test_rust_log_fallback() {
        assert_eq!(filter_directive(None, Some("mcp_bridge=trace")), "mcp_bridge=trace");
        assert_eq!(filter_directive(Some(" "), Some("warn")), "warn");
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(filter_directive(None, None), "info");
        assert_eq!(filter_directive(Some(""), Some("")), "info");
    }
}
