//! Tracing setup for the `sysmem` binary.
//!
//! Filter: `SYSMEM_DEBUG_LOG=1` forces `debug`; otherwise `SYSMEM_LOG`
//! directives, falling back to `info`. Events go to stderr and, when the
//! project's log directory can be created, to a daily rolling file there.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "sysmem.log";

fn build_env_filter() -> EnvFilter {
    let debug_enabled = env::var("SYSMEM_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env("SYSMEM_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Keep the returned guard alive until exit.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match fs_err::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
