use std::time::{Duration, Instant};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления жизненным циклом логирования.
///
/// Держит guard файлового writer-а: пока handle жив, фоновый поток
/// дописывает буфер в файл.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Сбрасывает буферы файлового вывода. Блокирует до завершения записи.
    pub fn shutdown(mut self) {
        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }

    /// Асинхронный вариант: сброс выполняется в блокирующем потоке и
    /// ограничен `flush_timeout`.
    pub async fn shutdown_async(mut self) {
        let guard = self.file_guard.take();
        let timeout = self.flush_timeout;

        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || drop(guard))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Logging shutdown task failed: {e}"),
            Err(_) => eprintln!(
                "WARNING: logging shutdown exceeded timeout of {}ms",
                timeout.as_millis()
            ),
        }
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.has_file_sink())
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_without_file_sink() {
        let handle = LoggingHandle::new(None).with_flush_timeout(Duration::from_millis(10));
        assert!(!handle.has_file_sink());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_async_shutdown_flushes_file_guard() {
        let tmp = tempfile::tempdir().unwrap();
        let appender = tracing_appender::rolling::never(tmp.path(), "h.log");
        let (_writer, guard) = tracing_appender::non_blocking(appender);

        let handle = LoggingHandle::new(Some(guard));
        assert!(handle.has_file_sink());
        handle.shutdown_async().await;
    }
}
