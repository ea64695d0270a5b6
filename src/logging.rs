//! Tracing bootstrap for binaries and services embedding the core.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log file prefix inside `OUTREACH_LOG_DIR`.
const LOG_FILE_PREFIX: &str = "outreach.log";

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). When `OUTREACH_LOG_DIR` is
/// set, events are also written to a daily-rotated file there; keep the
/// returned guard alive for the lifetime of the process or buffered lines
/// are lost. Calling this twice is a no-op.
pub fn init_tracing() -> Option<WorkerGuard> {
    let log_dir = std::env::var("OUTREACH_LOG_DIR").ok().map(PathBuf::from);
    init_with(log_dir)
}

fn init_with(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return None;
    }
    guard
}
