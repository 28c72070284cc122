use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Код статуса ошибки.
///
/// Старшая цифра кода задаёт [`Category`], поэтому новый код достаточно
/// добавить в нужную тысячу.
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    Internal = 1000,
    Unsupported = 1001,
    InvalidArgs = 1002,

    // Данные сущностей и отзывов
    NotFound = 2000,
    InvalidValue = 2001,
    InvalidData = 2002,

    // Лимиты сервера
    TooManyConnections = 4000,
    Overflow = 4001,

    StorageUnavailable = 5000,

    // Транспорт и доставка подписчику
    Io = 6000,
    ConnectionClosed = 6001,
    WriteTimeout = 6002,
    SubscriptionClosed = 6003,
    EncodingError = 6004,

    // Строковый протокол
    InvalidCommand = 8000,
    InvalidFloat = 8001,
    ParseError = 8002,
}

/// Группа кодов по старшей цифре.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    General,
    Data,
    Limits,
    Storage,
    Transport,
    Protocol,
}

/// Уровень, с которым ошибку стоит писать в лог.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn category(self) -> Category {
        match self.code() / 1000 {
            2 => Category::Data,
            4 => Category::Limits,
            5 => Category::Storage,
            6 => Category::Transport,
            8 => Category::Protocol,
            _ => Category::General,
        }
    }

    /// Ошибка вызвана запросом клиента, а не состоянием сервера.
    pub fn is_client_error(self) -> bool {
        matches!(self.category(), Category::Data | Category::Protocol)
            || self == Self::InvalidArgs
    }

    /// Повтор той же операции позже может пройти.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable | Self::TooManyConnections | Self::WriteTimeout
        )
    }

    /// Уровень логирования.
    ///
    /// Уход одного подписчика штатен для сервера и пишется как `Debug`;
    /// ошибки клиента как `Info`; недоступное хранилище как `Error`.
    pub fn log_level(self) -> LogLevel {
        match self {
            Self::ConnectionClosed | Self::SubscriptionClosed | Self::NotFound => LogLevel::Debug,
            Self::Internal | Self::StorageUnavailable => LogLevel::Error,
            _ if self.is_client_error() => LogLevel::Info,
            _ => LogLevel::Warn,
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
