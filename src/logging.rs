use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Install the global subscriber. The returned guard flushes the
/// non-blocking appender and must live for the rest of the process.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    if !config.log_enabled {
        return None;
    }

    let (writer, guard) = open_writer(config.log_file.trim());
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(build_filter(&config.log_level))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Some(guard)
}

/// A bare level like "debug" is scoped to this crate so reqwest and
/// friends stay at warn; full directive strings pass through untouched,
/// and an empty setting falls back to RUST_LOG.
fn build_filter(level: &str) -> EnvFilter {
    let level = level.trim();
    if level.is_empty() {
        return EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,gara_tui=info"));
    }
    let directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,gara_tui={level}")
    };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn,gara_tui=info"))
}

/// The TUI owns the terminal, so logs want a file. Without a usable one
/// the writer falls back to stderr, visible once the alternate screen is
/// torn down.
fn open_writer(path: &str) -> (NonBlocking, WorkerGuard) {
    if path.is_empty() {
        return tracing_appender::non_blocking(io::stderr());
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => tracing_appender::non_blocking(file),
        Err(_) => tracing_appender::non_blocking(io::stderr()),
    }
}
