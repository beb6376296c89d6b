//! Tracing setup shared by the binaries and tests of the workspace.
//!
//! Logs are written to stderr through a non-blocking writer so that stdout only carries the
//! output a program prints on purpose. The filter is read from `RUST_LOG` and defaults to
//! `info`.

use std::io;
use std::sync::Once;

use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be kept alive for as long as the program logs, usually until the end of `main`.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber for the application `app_name`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .try_init()?;

    info!(app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber that writes through the test harness, once per process.
///
/// Later calls are no-ops, so every test can call it unconditionally.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();

        info!("still logging after repeated initialization");
    }

    #[test]
    fn test_init_tracing_after_test_tracing_fails() {
        init_test_tracing();

        assert!(matches!(init_tracing("telemetry-test"), Err(TracingError::Init(_))));
    }
}
