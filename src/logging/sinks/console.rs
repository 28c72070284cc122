use tracing_subscriber::registry::LookupSpan;

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, BoxedLayer},
};

/// Console layer в stdout по конфигурации.
pub fn layer_with_config<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    formatter::build_layer(
        config.format,
        &config.console,
        config.console.with_ansi,
        std::io::stdout as fn() -> std::io::Stdout,
    )
}
