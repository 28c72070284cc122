use std::{fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, LogLevel, StatusCode};

/// Ошибка слоя с цепочкой контекстов.
///
/// Корневая ошибка определяет код и сообщение для клиента; контексты
/// (например, имя команды) нужны только логам и несут место вызова.
pub struct StackError {
    root: Box<dyn ErrorExt>,
    frames: Vec<Frame>,
}

/// Один уровень контекста.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message: Arc<str>,
    pub location: &'static Location<'static>,
}

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Box::new(err),
            frames: Vec::new(),
        }
    }

    #[track_caller]
    pub fn context(
        mut self,
        message: impl Into<Arc<str>>,
    ) -> Self {
        self.frames.push(Frame {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn root(&self) -> &dyn ErrorExt {
        self.root.as_ref()
    }

    /// Контексты от внутреннего к внешнему.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }

    pub fn client_message(&self) -> String {
        self.root.client_message()
    }

    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.root.metrics_tags()
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for StackError {
    /// Внешний контекст первым: `MOVE: vehicle 7 not found`.
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl fmt::Debug for StackError {
    /// Как `Display`, плюс код и места вызова контекстов.
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{self} [{}]", self.status_code())?;
        for frame in self.frames.iter().rev() {
            write!(
                f,
                " at {}:{}",
                frame.location.file(),
                frame.location.line()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(err: E) -> Self {
        Self::new(err)
    }
}
