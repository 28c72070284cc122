use tracing::debug;

use super::{
    EventPayload, PublishReport, TopicRegistry, ENTITY_CREATED, ENTITY_LOCATION_UPDATED,
};
use crate::store::Vehicle;

/// Подтверждённое хранилищем изменение сущности.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    VehicleCreated(Vehicle),
    VehicleLocationUpdated(Vehicle),
}

impl Change {
    /// Тема, в которую публикуется изменение.
    pub fn topic(&self) -> &'static str {
        match self {
            Change::VehicleCreated(_) => ENTITY_CREATED,
            Change::VehicleLocationUpdated(_) => ENTITY_LOCATION_UPDATED,
        }
    }

    pub fn vehicle(&self) -> &Vehicle {
        match self {
            Change::VehicleCreated(v) | Change::VehicleLocationUpdated(v) => v,
        }
    }
}

/// Хук, вызываемый после того, как запись подтверждена хранилищем.
///
/// Реализация не должна блокироваться и не может сообщить об ошибке:
/// успешная запись уже зафиксирована.
pub trait CommitHook: Send + Sync {
    fn on_commit(
        &self,
        change: &Change,
    );
}

/// Точка входа для публикации изменений.
///
/// Не знает о подписчиках и не ждёт их: ошибки доставки локальны для
/// сессий и сюда не возвращаются.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: TopicRegistry,
}

impl Broadcaster {
    pub fn new(registry: TopicRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn broadcast(
        &self,
        topic: &str,
        payload: impl Into<EventPayload>,
    ) -> PublishReport {
        self.registry.publish(topic, payload.into())
    }
}

impl CommitHook for Broadcaster {
    fn on_commit(
        &self,
        change: &Change,
    ) {
        let topic = change.topic();
        let report = self.broadcast(topic, change.vehicle().clone());
        debug!(
            topic,
            vehicle_id = %change.vehicle().id,
            subscribers = report.subscribers,
            dropped = report.dropped,
            "change broadcast"
        );
    }
}
