//! Логирование на `tracing`: фильтры, форматы, консольный и файловый
//! вывод.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig, LOG_ENV_VAR};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ConfigError;

/// Инициализирует глобальный subscriber по конфигурации.
///
/// Повторный вызов в том же процессе возвращает
/// `ConfigError::LoggingInit`.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingHandle, ConfigError> {
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(config);
    let mut layers = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer_with_config(config));
    }

    let file_guard = if config.file.enabled {
        let (layer, guard) = sinks::file::layer_with_config(config);
        layers.push(layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| ConfigError::LoggingInit {
            reason: e.to_string(),
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        console = config.console.enabled,
        file = config.file.enabled,
        "logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
