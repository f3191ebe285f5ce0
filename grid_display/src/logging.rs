use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "CONWAY_LOG_FILTER";

// Chatty graphics/windowing crates stay at warn unless asked for explicitly.
const NOISY_TARGETS: &[&str] = &["eframe", "egui_glow", "winit", "wgpu_core", "naga", "calloop"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
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
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

/// Installs the global subscriber. Keep the returned guard alive for as
/// long as logs should be flushed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, InitError> {
    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io { path: path.clone(), source })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level))
        .with_target(config.level >= LogLevel::Debug)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;
    Ok(guard)
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = std::env::var(FILTER_ENV) {
        return EnvFilter::new(filter);
    }
    EnvFilter::new(default_filter(level))
}

fn default_filter(level: LogLevel) -> String {
    let level = level.to_filter();
    let mut directives = vec![level.to_string().to_lowercase()];
    if level > LevelFilter::WARN {
        directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
    }
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_levels_do_not_mention_dependencies() {
        assert_eq!(default_filter(LogLevel::Warn), "warn");
        assert_eq!(default_filter(LogLevel::Error), "error");
    }

    #[test]
    fn verbose_levels_throttle_graphics_crates() {
        let filter = default_filter(LogLevel::Debug);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("winit=warn"));
    }
}
