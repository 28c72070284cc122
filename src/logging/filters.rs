use tracing_subscriber::EnvFilter;

use super::config::{LoggingConfig, LOG_ENV_VAR};

/// Собирает фильтр: `LIVECAST_LOG`, затем `RUST_LOG`, затем конфигурация.
///
/// Некорректная директива из конфигурации заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}
