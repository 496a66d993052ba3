//! tracing-subscriber setup.
//!
//! Call [`init`] once at startup, after the effective level is resolved.
//! Output goes to stderr, or to an append-only file without ANSI colours
//! when `server.log_file` is set.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Accept `level` if it is a bare level name (`"debug"`) or an `EnvFilter`
/// directive list (`"jimothy=debug,tower=warn"`).
///
/// Bare names are matched against the level set so a typo such as
/// `"verbose"` is reported instead of silently filtering everything out.
pub fn check_level(level: &str) -> Result<(), String> {
    let level = level.trim();
    if level.is_empty() {
        return Err("log level must not be empty".into());
    }
    if is_directive(level) {
        return EnvFilter::try_new(level)
            .map(|_| ())
            .map_err(|e| format!("invalid log filter '{level}': {e}"));
    }
    level
        .parse::<LevelFilter>()
        .map(|_| ())
        .map_err(|_| format!("unrecognised log level '{level}'"))
}

fn is_directive(level: &str) -> bool {
    level.contains(['=', ',', '[', ':'])
}

/// Install the global subscriber.
///
/// With `prefer_level` (the level came from `-v` flags) `level` wins over
/// `RUST_LOG`; otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = filter(level, prefer_level)?;
    let to_file = log_file.is_some();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer(log_file)?)
        .with_ansi(!to_file)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    let from_env = || EnvFilter::try_from_default_env().map_err(|e| e.to_string());
    let from_level = || EnvFilter::try_new(level).map_err(|e| e.to_string());

    let filter = if prefer_level {
        from_level().or_else(|_| from_env())
    } else {
        from_env().or_else(|_| from_level())
    };
    filter.map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}

fn writer(log_file: Option<&Path>) -> Result<BoxMakeWriter, AppError> {
    let Some(path) = log_file else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Logger(format!("cannot open log file {}: {e}", path.display())))?;
    Ok(BoxMakeWriter::new(file))
}
