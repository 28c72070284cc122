//! Сессия подписки: долгоживущий потребитель одной темы.
//!
//! - `state`: состояния сессии и причины завершения.
//! - `sink`: получатели событий (JSON-строки в `AsyncWrite`, `mpsc`-канал).
//! - `lifecycle`: цикл пересылки событий и гарантированная отписка.

pub mod lifecycle;
pub mod sink;
pub mod state;

pub use lifecycle::*;
pub use sink::*;
pub use state::*;
