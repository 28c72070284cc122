use std::{fmt, sync::Arc};

use serde::Serialize;

use crate::store::Vehicle;

/// Тема: координаты сущности изменились.
pub const ENTITY_LOCATION_UPDATED: &str = "entity-location-updated";
/// Тема: создана новая сущность.
pub const ENTITY_CREATED: &str = "entity-created";

/// Полезная нагрузка события.
///
/// Встроенные темы несут снимок сущности после изменения; для
/// пользовательских тем допускается произвольный JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Vehicle(Vehicle),
    Json(serde_json::Value),
}

/// Неизменяемое событие, опубликованное в тему.
///
/// Клонирование дешёвое: тема и нагрузка разделяются через `Arc` между
/// всеми подписчиками. Порядковых номеров и временных меток нет; порядок
/// определяется только порядком вызовов `publish`.
#[derive(Clone)]
pub struct Event {
    topic: Arc<str>,
    payload: Arc<EventPayload>,
}

impl Event {
    pub fn new(
        topic: impl Into<Arc<str>>,
        payload: EventPayload,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: Arc::new(payload),
        }
    }

    pub(crate) fn from_shared(
        topic: Arc<str>,
        payload: Arc<EventPayload>,
    ) -> Self {
        Self { topic, payload }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Снимок сущности, если событие его несёт.
    pub fn vehicle(&self) -> Option<&Vehicle> {
        match self.payload.as_ref() {
            EventPayload::Vehicle(v) => Some(v),
            EventPayload::Json(_) => None,
        }
    }

    /// Проверяет, что два события разделяют одну и ту же нагрузку.
    pub fn shares_payload_with(
        &self,
        other: &Event,
    ) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl PartialEq for Event {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.topic == other.topic && self.payload == other.payload
    }
}

impl fmt::Debug for Event {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Event")
            .field("topic", &&*self.topic)
            .field("payload", &self.payload)
            .finish()
    }
}

impl From<Vehicle> for EventPayload {
    fn from(v: Vehicle) -> Self {
        EventPayload::Vehicle(v)
    }
}

impl From<serde_json::Value> for EventPayload {
    fn from(v: serde_json::Value) -> Self {
        EventPayload::Json(v)
    }
}
