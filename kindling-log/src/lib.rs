//! Kindling logging setup
//!
//! Initializes the `tracing-subscriber` stack used by embedding applications.
//! The orchestrator crates emit events through `tracing` macros with
//! per-subsystem targets (`kindling::group`, `kindling::unit`, ...); this
//! crate wires those targets to a formatted subscriber with per-subsystem
//! level control.
//!
//! Subscribers are global and installed at most once per process; call
//! [`init`] (or [`init_with_file`]) from the application entry point, never
//! from library code.

use std::io;

use kindling_config::Subsystem;
use tracing::Level;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Colorful formatting for development
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for tool integration
    Json,
}

/// Per-subsystem log level configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub group: Option<Level>,
    pub unit: Option<Level>,
    pub incremental: Option<Level>,
    pub order: Option<Level>,
    pub hotload: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::INFO,
            group: None,
            unit: None,
            incremental: None,
            order: None,
            hotload: None,
        }
    }
}

impl LogConfig {
    /// Get the log level for a specific subsystem
    pub fn level_for(&self, subsystem: Subsystem) -> Level {
        let override_level = match subsystem {
            Subsystem::Group => self.group,
            Subsystem::Unit => self.unit,
            Subsystem::Incremental => self.incremental,
            Subsystem::Order => self.order,
            Subsystem::Hotload => self.hotload,
        };
        override_level.unwrap_or(self.global)
    }

    fn targets(&self) -> Targets {
        let subsystems = [
            Subsystem::Group,
            Subsystem::Unit,
            Subsystem::Incremental,
            Subsystem::Order,
            Subsystem::Hotload,
        ];
        let mut targets = Targets::new().with_default(self.global);
        for subsystem in subsystems {
            targets = targets.with_target(subsystem.target(), self.level_for(subsystem));
        }
        targets
    }
}

/// Initialize logging to stderr with the given format and configuration
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(log_config.targets());
    tracing_subscriber::registry().with(layer).init();
}

/// Initialize logging to stderr and, optionally, a log file
pub fn init_with_file<P: AsRef<std::path::Path>>(
    log_config: &LogConfig,
    format: LogFormat,
    file: Option<P>,
) -> io::Result<()> {
    let targets = log_config.targets();

    if let Some(path) = file {
        let file_handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let stderr_layer = create_format_layer(format, io::stderr).with_filter(targets.clone());
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || {
                file_handle
                    .try_clone()
                    .expect("failed to clone log file handle")
            })
            .with_filter(targets);

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        let stderr_layer = create_format_layer(format, io::stderr).with_filter(targets);
        tracing_subscriber::registry().with(stderr_layer).init();
    }
    Ok(())
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(
    format: LogFormat,
    make_writer: F,
) -> impl Layer<tracing_subscriber::Registry>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_falls_back_to_global() {
        let config = LogConfig::default();
        assert_eq!(config.level_for(Subsystem::Unit), Level::INFO);
    }

    #[test]
    fn test_level_for_prefers_override() {
        let config = LogConfig {
            hotload: Some(Level::TRACE),
            ..LogConfig::default()
        };
        assert_eq!(config.level_for(Subsystem::Hotload), Level::TRACE);
        assert_eq!(config.level_for(Subsystem::Group), Level::INFO);
    }
}
