use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки загрузки конфигурации и инициализации логирования.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Не удалось прочитать или разобрать источник конфигурации
    #[error("failed to load configuration: {reason}")]
    Load { reason: String },
    /// Значение поля вне допустимого диапазона
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("configuration I/O error: {reason}")]
    Io { reason: String },
    /// Глобальный subscriber уже установлен или не может быть создан
    #[error("failed to initialize logging: {reason}")]
    LoggingInit { reason: String },
}

impl ConfigError {
    pub fn invalid(
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Load { .. } => StatusCode::InvalidData,
            Self::InvalidValue { .. } => StatusCode::InvalidValue,
            Self::Io { .. } => StatusCode::Io,
            Self::LoggingInit { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}
