pub mod parser;

pub use livecast_error::*;
pub use parser::ParseError;

use thiserror::Error;

/// Ошибки сетевого адаптера.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Maximum connections limit reached ({0})")]
    TooManyConnections(usize),

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for NetworkError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(e) => e.status_code(),
            Self::TooManyConnections(_) => StatusCode::TooManyConnections,
            Self::ShuttingDown => StatusCode::ConnectionClosed,
            Self::Io(_) => StatusCode::Io,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
