use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки внешнего хранилища записей.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("vehicle {id} not found")]
    VehicleNotFound { id: String },
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    /// Хранилище недоступно, запись не применена
    #[error("record store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl ErrorExt for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::VehicleNotFound { .. } => StatusCode::NotFound,
            Self::InvalidCoordinates { .. } => StatusCode::InvalidValue,
            Self::InvalidInput { .. } => StatusCode::InvalidArgs,
            Self::Unavailable { .. } => StatusCode::StorageUnavailable,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Unavailable { .. } => "Record store unavailable".to_string(),
            other => other.to_string(),
        }
    }
}
