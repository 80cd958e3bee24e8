use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "admission-qa.log";

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level or EnvFilter directive
    pub level: String,
    pub log_dir: PathBuf,
    pub rotation: LogRotation,
    pub console_enabled: bool,
    pub file_enabled: bool,
    /// JSON lines in the log file
    pub json_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "daily" => Some(LogRotation::Daily),
            "hourly" => Some(LogRotation::Hourly),
            "never" => Some(LogRotation::Never),
            _ => None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            rotation: LogRotation::Daily,
            console_enabled: true,
            file_enabled: false,
            json_file: false,
        }
    }
}

impl LogConfig {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut log_config = Self {
            level: config.level.clone(),
            console_enabled: config.console,
            file_enabled: config.file,
            json_file: config.json,
            ..Self::default()
        };
        if let Some(dir) = &config.dir {
            log_config.log_dir = PathBuf::from(dir);
        }
        if let Some(rotation) = LogRotation::parse(&config.rotation) {
            log_config.rotation = rotation;
        }
        log_config
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Installs the global subscriber.
///
/// Console output goes to stderr so answers on stdout stay clean. The
/// returned guard flushes the file writer and must be held until exit.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    });

    let mut guard = None;
    let file_layer = if config.file_enabled {
        ensure_log_dir(&config.log_dir)?;
        let file_appender = match config.rotation {
            LogRotation::Daily => rolling::daily(&config.log_dir, LOG_FILE_PREFIX),
            LogRotation::Hourly => rolling::hourly(&config.log_dir, LOG_FILE_PREFIX),
            LogRotation::Never => rolling::never(&config.log_dir, LOG_FILE_PREFIX),
        };
        let (writer, worker_guard) = non_blocking(file_appender);
        guard = Some(worker_guard);
        let layer = if config.json_file {
            fmt::layer().json().with_writer(writer).boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        level = %config.level,
        console = config.console_enabled,
        file = config.file_enabled,
        "logging initialized"
    );
    if config.file_enabled {
        tracing::debug!("log directory: {}", config.log_dir.display());
    }

    Ok(guard)
}
