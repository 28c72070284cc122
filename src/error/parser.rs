use std::any::Any;

use thiserror::Error;

use super::{ErrorExt, StatusCode};

/// Ошибки разбора строки команды.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{0} requires {1} argument(s)")]
    WrongArgCount(&'static str, &'static str),

    #[error("{0}: '{1}' is not a valid number")]
    InvalidFloat(&'static str, String),

    #[error("{0}: '{1}' is not a valid integer")]
    InvalidInteger(&'static str, String),
}

impl ErrorExt for ParseError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Empty | Self::UnknownCommand(_) => StatusCode::InvalidCommand,
            Self::WrongArgCount(..) => StatusCode::InvalidArgs,
            Self::InvalidFloat(..) => StatusCode::InvalidFloat,
            Self::InvalidInteger(..) => StatusCode::ParseError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
