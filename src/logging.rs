//! Logging setup on top of tracing
//!
//! One subscriber per process: an `EnvFilter` (overridable with `RUST_LOG`),
//! an optional stdout layer and a daily-rotated file layer under
//! `logging.file`. Modules log through a [`StructuredLogger`] so every line
//! carries the component that produced it.

use crate::config::LoggingConfig;
use crate::error::{BridgeError, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod level;
mod structured;

pub use level::{level_rank, min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

/// Set to any value to skip the file layer (useful when running off-device)
pub const DISABLE_FILE_LOG_ENV: &str = "ENPHASE_DISABLE_FILE_LOG";

/// Outcome of the first `init_logging` call, replayed to later callers
static INIT_RESULT: OnceCell<std::result::Result<(), String>> = OnceCell::new();
// Dropping the guard would stop the background writer
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Install the global subscriber. Safe to call repeatedly; only the first
/// call has an effect.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_RESULT
        .get_or_init(|| install(config).map_err(|e| e.to_string()))
        .clone()
        .map_err(BridgeError::config)
}

fn install(config: &LoggingConfig) -> Result<()> {
    let base = parse_log_level(&config.level)?;
    let console_level = override_level(config.console_level.as_deref(), base);
    let file_level = override_level(config.file_level.as_deref(), base);

    let file_dir = if file_logging_disabled() {
        None
    } else {
        Some(log_directory(&config.file))
    };

    // The filter admits whatever the most verbose layer wants
    let admitted = match file_dir {
        Some(_) => min_level(console_level, file_level),
        None => console_level,
    };
    let registry = tracing_subscriber::registry().with(env_filter(admitted));

    let Some(dir) = file_dir else {
        // Test harnesses may already have installed a subscriber
        let _ = registry
            .with(console_layer(config.json_format, console_level))
            .try_init();
        info!(?console_level, "Logging to console only");
        return Ok(());
    };

    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(env!("CARGO_PKG_NAME"))
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(&dir)
        .map_err(|e| {
            BridgeError::io(format!(
                "Cannot open log directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    let (writer, guard) = non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);
    let file_layer: BoxedLayer<_> = if config.json_format {
        file_layer
            .json()
            .with_filter(LevelFilter::from_level(file_level))
            .boxed()
    } else {
        file_layer
            .with_filter(LevelFilter::from_level(file_level))
            .boxed()
    };
    let console = config
        .console_output
        .then(|| console_layer(config.json_format, console_level));

    registry
        .with(file_layer)
        .with(console)
        .try_init()
        .map_err(|e| BridgeError::config(format!("Logging already initialized: {}", e)))?;

    info!(
        ?console_level,
        ?file_level,
        dir = %dir.display(),
        "Logging initialized"
    );
    Ok(())
}

/// Per-layer level, falling back to `base` when unset or unparsable
fn override_level(value: Option<&str>, base: Level) -> Level {
    value.and_then(|s| parse_log_level(s).ok()).unwrap_or(base)
}

/// `logging.file` may name a directory or a file inside it
fn log_directory(configured: &str) -> PathBuf {
    let path = Path::new(configured);
    match (path.extension(), path.parent()) {
        (Some(_), Some(parent)) => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

fn file_logging_disabled() -> bool {
    cfg!(test) || std::env::var_os(DISABLE_FILE_LOG_ENV).is_some()
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "enphase_venus={},zbus=warn,reqwest=warn,hyper=warn",
            level
        ))
    })
}

fn console_layer<S>(json_format: bool, level: Level) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    if json_format {
        layer
            .json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        layer.with_filter(LevelFilter::from_level(level)).boxed()
    }
}
