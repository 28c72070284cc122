use std::fmt;

use serde::Serialize;

use crate::DeliveryError;

/// Состояние сессии подписки в её жизненном цикле.
///
/// Переходы только вперёд: `Pending → Active → Closing → Terminated`.
/// Из `Pending` можно сразу перейти в `Closing`, если сессия так и не была
/// активирована.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    /// Создана, подписки ещё нет
    Pending,
    /// Подписка зарегистрирована, события пересылаются клиенту
    Active,
    /// Выход из цикла, идёт отписка
    Closing,
    /// Подписка снята, сессия больше не используется
    Terminated,
}

/// Почему сессия завершилась.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Клиент отключился
    TransportClosed,
    /// Явная отмена через `CancelHandle` или закрытие темы
    Cancelled,
    /// Не удалось доставить событие клиенту
    DeliveryFailed(DeliveryError),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SessionState {
    pub fn can_transition_to(
        &self,
        next: SessionState,
    ) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Closing) | (Active, Closing) | (Closing, Terminated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }
}

impl CloseReason {
    /// Короткая метка для логов.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::TransportClosed => "transport_closed",
            CloseReason::Cancelled => "cancelled",
            CloseReason::DeliveryFailed(_) => "delivery_failed",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for SessionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            CloseReason::DeliveryFailed(err) => write!(f, "delivery failed: {err}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use SessionState::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Terminated));
        assert!(Pending.can_transition_to(Closing));
    }

    /// Тест проверяет, что завершённая сессия не может быть возобновлена.
    #[test]
    fn test_no_resume_after_termination() {
        use SessionState::*;
        for next in [Pending, Active, Closing, Terminated] {
            assert!(!Terminated.can_transition_to(next));
        }
        assert!(!Active.can_transition_to(Pending));
        assert!(!Closing.can_transition_to(Active));
        assert!(Terminated.is_terminal());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Cancelled.to_string(), "cancelled");
        let reason = CloseReason::DeliveryFailed(DeliveryError::TransportClosed);
        assert_eq!(reason.to_string(), "delivery failed: transport is closed");
    }
}
