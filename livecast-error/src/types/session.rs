use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибка доставки события клиенту.
///
/// Локальна для одной сессии: переводит её в `Closing` и никогда не
/// возвращается в `Broadcaster`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Событие не удалось закодировать в формат клиента
    #[error("failed to encode event for topic {topic}: {reason}")]
    Encode { topic: String, reason: String },
    /// Запись в транспорт завершилась ошибкой
    #[error("transport write failed: {reason}")]
    Write { reason: String },
    /// Запись в транспорт не уложилась в таймаут
    #[error("transport write timed out after {timeout_ms}ms")]
    WriteTimeout { timeout_ms: u64 },
    /// Транспорт уже закрыт клиентом
    #[error("transport is closed")]
    TransportClosed,
}

impl ErrorExt for DeliveryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Encode { .. } => StatusCode::EncodingError,
            Self::Write { .. } => StatusCode::Io,
            Self::WriteTimeout { .. } => StatusCode::WriteTimeout,
            Self::TransportClosed => StatusCode::ConnectionClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "delivery".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::Encode { topic, .. } = self {
            tags.push(("topic", topic.clone()));
        }
        tags
    }
}

/// Ошибки жизненного цикла сессии подписки.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Недопустимый переход между состояниями
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl ErrorExt for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidTransition { .. } => StatusCode::Unsupported,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_codes() {
        assert_eq!(
            DeliveryError::WriteTimeout { timeout_ms: 10 }.status_code(),
            StatusCode::WriteTimeout
        );
        assert_eq!(
            DeliveryError::TransportClosed.status_code(),
            StatusCode::ConnectionClosed
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = SessionError::InvalidTransition {
            from: "Terminated".into(),
            to: "Active".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid session transition: Terminated -> Active"
        );
        assert_eq!(err.status_code(), StatusCode::Unsupported);
    }

    #[test]
    fn test_encode_error_tags_topic() {
        let err = DeliveryError::Encode {
            topic: "entity-created".into(),
            reason: "bad float".into(),
        };
        let tags = err.metrics_tags();
        assert!(tags.contains(&("topic", "entity-created".to_string())));
    }
}
