//! logging bootstrap: a non-blocking file layer at the resolved `log_path`
//! (truncated first when `wipe_log` is set) plus a verbosity-controlled
//! stderr layer. Ported from the reference implementation's `cmd/logs.rs`.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crunchize_core::ResolvedConfig;

/// Initializes the global subscriber and returns a guard that must be kept
/// in scope for the run's duration; dropping it flushes the file writer.
pub fn init(config: &ResolvedConfig, verbosity: u8) -> WorkerGuard {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let log_path = config.log_path.clone().unwrap_or_else(|| PathBuf::from("crunchize.log"));
    if config.wipe_log {
        let _ = std::fs::remove_file(&log_path);
    }

    let dir: &Path = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "crunchize.log".to_string());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false).with_filter(LevelFilter::from_level(level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(LevelFilter::from_level(level));

    tracing_subscriber::registry().with(file_layer).with(stderr_layer).init();

    guard
}
