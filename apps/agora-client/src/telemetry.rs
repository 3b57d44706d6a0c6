//! Log output for the client binary.
//!
//! One `tracing` subscriber writes to stderr, or to a file through a
//! non-blocking worker. `AGORA_LOG_FILTER` replaces the computed directives
//! outright.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Log targets that follow the requested level. Everything else is held at
/// info or quieter.
const CLIENT_TARGETS: &[&str] = &["agora", "agora_client", "agora_bus", "agora_proto"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    AlreadySet(#[from] SetGlobalDefaultError),
}

/// Flushes the background writer when the process exits.
static WRITER: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if WRITER.get().is_some() {
        return Ok(());
    }

    let directives = std::env::var("AGORA_LOG_FILTER")
        .unwrap_or_else(|_| directives(config.level, env_flag("AGORA_TRACE_DEPS")));

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&directives))
        .with_target(config.level >= LogLevel::Debug)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = WRITER.set(guard);

    tracing::debug!(target = "agora::telemetry", %directives, "logging initialised");
    Ok(())
}

/// Client targets at `level`; dependencies at the same level capped at info,
/// unless `trace_deps` lets them through at trace.
pub(crate) fn directives(level: LogLevel, trace_deps: bool) -> String {
    let dependencies = match level {
        LogLevel::Trace if trace_deps => LogLevel::Trace,
        other => other.min(LogLevel::Info),
    };
    let mut out = dependencies.directive().to_string();
    for target in CLIENT_TARGETS {
        out.push(',');
        out.push_str(target);
        out.push('=');
        out.push_str(level.directive());
    }
    out
}

fn env_flag(var: &str) -> bool {
    std::env::var(var).is_ok_and(|v| !v.is_empty() && v != "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_levels_apply_everywhere() {
        assert_eq!(
            directives(LogLevel::Warn, false),
            "warn,agora=warn,agora_client=warn,agora_bus=warn,agora_proto=warn"
        );
    }

    #[test]
    fn dependencies_stay_at_info_while_the_client_traces() {
        let filter = directives(LogLevel::Trace, false);
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("agora_client=trace"));
        assert!(directives(LogLevel::Trace, true).starts_with("trace,"));
        assert!(directives(LogLevel::Debug, true).starts_with("info,"));
    }

    #[test]
    fn level_maps_onto_tracing_filters() {
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    }
}
