use crate::config::LoggingConfig;
use std::path::Path;
use tracing::subscriber::set_global_default;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Structured logging: daily-rotated JSON file plus console output.
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    init_logging_at(Path::new(&config.directory), &config.level)
}

pub fn init_logging_at(log_dir: &Path, log_level: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "backend.log");

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_target(true);

    let console_layer = fmt::layer().with_target(true);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);

    set_global_default(subscriber)?;

    tracing::info!("logging initialized with level: {}", log_level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_initialization() {
        let temp_dir = tempdir().unwrap();
        let result = init_logging_at(temp_dir.path(), "info");
        assert!(result.is_ok());
    }
}
