use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub const LOG_FILE_NAME: &str = "pyshell_venv.log";
pub const LOG_FILE_ENV: &str = "PSV_LOG_FILE";
pub const LOG_FILTER_ENV: &str = "PSV_LOG";

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub verbose: u8,
    pub quiet: bool,
    pub ansi: bool,
    /// Defaults to `pyshell_venv.log` in the work directory.
    pub log_file: Option<PathBuf>,
}

impl LogConfig {
    fn console_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// File that receives the debug-level log.
    #[must_use]
    pub fn log_path(&self, work_dir: &Path) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| work_dir.join(LOG_FILE_NAME))
    }
}

/// Installs the global subscriber: console at info (or as `-v`/`-q` say),
/// append-only file at debug. Keep the guard alive until exit so the file
/// writer flushes.
///
/// # Errors
///
/// Fails when the work directory is missing (default log location), the log
/// file cannot be opened, or a subscriber is already set.
pub fn init(config: &LogConfig, work_dir: &Path) -> Result<WorkerGuard> {
    let path = config.log_path(work_dir);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => work_dir.to_path_buf(),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    if config.log_file.is_some() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    } else if !work_dir.is_dir() {
        // the appender would create it otherwise
        bail!("work directory does not exist: {}", work_dir.display());
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(&dir)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config.console_level()));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(config.ansi)
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_level_follows_flags() {
        let mut config = LogConfig::default();
        assert_eq!(config.console_level(), "info");
        config.verbose = 1;
        assert_eq!(config.console_level(), "debug");
        config.verbose = 3;
        assert_eq!(config.console_level(), "trace");
        config.quiet = true;
        assert_eq!(config.console_level(), "error");
    }

    #[test]
    fn missing_work_dir_is_not_created_for_default_log() {
        let temp = tempfile::tempdir().unwrap();
        let work = temp.path().join("absent");
        let err = init(&LogConfig::default(), &work).unwrap_err();
        assert!(err.to_string().contains("work directory does not exist"));
        assert!(!work.exists());
    }

    #[test]
    fn log_file_defaults_to_work_dir() {
        let config = LogConfig::default();
        assert_eq!(
            config.log_path(Path::new("/w")),
            PathBuf::from("/w/pyshell_venv.log")
        );
        let config = LogConfig {
            log_file: Some(PathBuf::from("/var/log/psv.log")),
            ..LogConfig::default()
        };
        assert_eq!(
            config.log_path(Path::new("/w")),
            PathBuf::from("/var/log/psv.log")
        );
    }
}
