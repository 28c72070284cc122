use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки неблокирующего получения события из подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    /// В буфере подписки нет событий
    #[error("no events available")]
    Empty,
    /// Подписка отменена и буфер вычитан до конца
    #[error("subscription is closed")]
    Closed,
}

impl ErrorExt for TryRecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Empty => StatusCode::NotFound,
            Self::Closed => StatusCode::SubscriptionClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
