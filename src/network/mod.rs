//! Сетевой адаптер: строковый протокол поверх TCP.
//!
//! ## Подмодули
//!
//! - `command`: разбор команд, по одной на строку.
//! - `connection`: лимит соединений, graceful shutdown и обработка
//!   отдельного соединения, включая режим подписки.
//! - `server`: цикл приёма соединений.

pub mod command;
pub mod connection;
pub mod server;

use std::sync::Arc;

pub use command::Command;
pub use connection::{ConnectionConfig, ConnectionManager};
pub use server::{run_tcp_server, serve};

use crate::{
    pubsub::TopicRegistry,
    service::VehicleService,
    store::{InMemoryStore, RecordStore},
};

/// Сервис поверх хранилища, выбранного во время выполнения.
pub type SharedService = Arc<VehicleService<Arc<dyn RecordStore>>>;

/// Общее состояние, разделяемое всеми соединениями.
#[derive(Clone)]
pub struct AppState {
    pub service: SharedService,
    pub registry: TopicRegistry,
}

impl AppState {
    /// Состояние с сервисом, который рассылает изменения в `registry`.
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: TopicRegistry,
    ) -> Self {
        let service = VehicleService::with_broadcaster(store, registry.clone());
        Self {
            service: Arc::new(service),
            registry,
        }
    }

    /// Пустое in-memory хранилище и реестр с политикой по умолчанию.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), TopicRegistry::default())
    }
}
