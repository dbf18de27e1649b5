use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

// Log targets
pub const PARSE: &str = "readmark_parse";
pub const INDEX: &str = "readmark_index";
pub const MATCHER: &str = "readmark_matcher";
pub const OUTLINE: &str = "readmark_outline";

const ENGINE_TARGETS: &[&str] = &[PARSE, INDEX, MATCHER, OUTLINE];

fn engine_filter(level: Level) -> EnvFilter {
    let directives = ENGINE_TARGETS
        .iter()
        .map(|t| format!("{}={}", t, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Install the global subscriber: a stderr layer filtered by `RUST_LOG`
/// (engine targets at `debug` when `verbose`, otherwise `info`), plus an
/// optional file layer under `log_dir`. Keep the returned guard alive for
/// the file layer to flush.
pub fn init_logging(verbose: bool, log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(engine_filter(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::NEVER, dir, "readmark.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_filter(engine_filter(Level::TRACE));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}
