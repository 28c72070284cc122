use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::registry::LookupSpan;

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, BoxedLayer},
};

/// Файловый layer с ежедневной ротацией и неблокирующей записью.
///
/// Guard нужно держать до конца работы процесса, иначе хвост буфера
/// потеряется.
pub fn layer_with_config<S>(config: &LoggingConfig) -> (BoxedLayer<S>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(&config.file.directory, &config.file.filename);
    let (writer, guard) = non_blocking(appender);
    let layer = formatter::build_layer(config.file.format, &config.console, false, writer);
    (layer, guard)
}
