//! Подсистема Publish–Subscribe (pub/sub) для внутрипроцессной рассылки
//! изменений отслеживаемых сущностей.
//!
//! - `event`: событие и его полезная нагрузка, встроенные темы.
//! - `mailbox` (приватный): буфер доставки одной подписки и политики
//!   переполнения.
//! - `registry`: реестр тем и подписок, публикация.
//! - `subscription`: подписка, handle отмены, статистика.
//! - `broadcaster`: публикация подтверждённых изменений через post-commit хук.
//!
//! Публичный API переэкспортирует все типы вложенных модулей.

pub mod broadcaster;
pub mod event;
mod mailbox;
pub mod registry;
pub mod subscription;

pub use broadcaster::*;
pub use event::*;
pub use mailbox::{DeliveryPolicy, OverflowPolicy};
pub use registry::*;
pub use subscription::*;
