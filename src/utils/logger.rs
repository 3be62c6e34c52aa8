// Logger initialization

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "bucketctl.log";

/// Install the global subscriber: stderr always, plus a daily rolling file
/// when a log directory is configured.
///
/// Keep the returned guard alive until exit or buffered file lines are lost.
pub fn init_logger(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| anyhow::anyhow!("Invalid log filter {:?}: {}", config.filter, e))?;

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            filter: "bucketctl=verbose".to_string(),
            log_dir: None,
        };
        assert!(init_logger(&config).is_err());
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let config = LoggingConfig {
            filter: "bucketctl=debug".to_string(),
            log_dir: Some(log_dir.clone()),
        };

        let guard = init_logger(&config).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());
    }
}
