//! Tracing setup for the CLI
//!
//! `RUST_LOG` wins when set; otherwise the crate logs at `info`. Logs go to
//! stderr, or to a daily-rolling file when a log directory is given.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str = "jute_sync=info";

/// Filter from `directives`, falling back to [`DEFAULT_DIRECTIVES`]
pub fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit so buffered file logs are flushed.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter(directives.as_deref());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "jute-sync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_info() {
        assert_eq!(filter(None).to_string(), DEFAULT_DIRECTIVES);
    }

    #[test]
    fn test_custom_directives() {
        assert_eq!(filter(Some("jute_sync=debug")).to_string(), "jute_sync=debug");
    }

    #[test]
    fn test_invalid_directives_fall_back() {
        assert_eq!(filter(Some("jute_sync=loud")).to_string(), DEFAULT_DIRECTIVES);
    }
}
