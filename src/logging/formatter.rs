use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::config::{ConsoleConfig, LogFormat};

pub type BoxedLayer<S> = Box<dyn LayerTrait<S> + Send + Sync>;

/// Собирает fmt-layer для заданного формата и writer-а.
///
/// Конкретный тип формата стирается в `Box<dyn Layer>`.
pub fn build_layer<S, W>(
    format: LogFormat,
    options: &ConsoleConfig,
    with_ansi: bool,
    writer: W,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .event_format(fmt::format().json().with_current_span(true))
            .with_writer(writer)
            .with_ansi(false)
            .with_target(options.with_target)
            .with_thread_ids(options.with_thread_ids)
            .with_line_number(options.with_line_numbers)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .event_format(fmt::format().pretty())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_ansi(with_ansi)
            .with_target(options.with_target)
            .with_thread_ids(options.with_thread_ids)
            .with_line_number(options.with_line_numbers)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .event_format(fmt::format().compact())
            .with_writer(writer)
            .with_ansi(with_ansi)
            .with_target(options.with_target)
            .with_thread_ids(options.with_thread_ids)
            .with_line_number(options.with_line_numbers)
            .boxed(),
    }
}
