use std::{fmt, sync::Arc};

use super::{mailbox::Mailbox, DeliveryPolicy, Event, TopicRegistry};
use crate::TryRecvError;

/// Идентификатор подписки, уникальный в пределах процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Счётчики одной подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionStats {
    /// Событий принято в буфер
    pub delivered: u64,
    /// Событий потеряно из-за переполнения
    pub dropped: u64,
    /// Событий сейчас в буфере
    pub buffered: usize,
}

/// Подписка одного потребителя на одну тему.
///
/// Владеет каналом доставки. Отписка происходит явно через
/// [`Subscription::unsubscribe`], через [`CancelHandle::cancel`] из другой
/// задачи или автоматически при `Drop`, поэтому запись в реестре не может
/// утечь ни на одном пути выхода.
pub struct Subscription {
    id: SubscriptionId,
    topic: Arc<str>,
    mailbox: Arc<Mailbox>,
    registry: TopicRegistry,
}

/// Клонируемый handle отмены подписки.
///
/// Отмена идемпотентна и сразу убирает подписку из реестра; сессия
/// замечает её на следующей итерации цикла.
#[derive(Clone)]
pub struct CancelHandle {
    id: SubscriptionId,
    topic: Arc<str>,
    mailbox: Arc<Mailbox>,
    registry: TopicRegistry,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Arc<str>,
        mailbox: Arc<Mailbox>,
        registry: TopicRegistry,
    ) -> Self {
        Self {
            id,
            topic,
            mailbox,
            registry,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.mailbox.policy()
    }

    /// Асинхронно ожидает следующее событие.
    ///
    /// # Возвращает
    /// - `Some(Event)` в порядке публикации
    /// - `None` после отписки, когда буфер вычитан до конца
    pub async fn recv(&mut self) -> Option<Event> {
        self.mailbox.pop().await
    }

    /// Пытается получить событие без ожидания.
    ///
    /// # Возвращает
    /// - `Err(TryRecvError::Empty)` если буфер пуст
    /// - `Err(TryRecvError::Closed)` если подписка закрыта и буфер пуст
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.mailbox.try_pop()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            id: self.id,
            topic: self.topic.clone(),
            mailbox: self.mailbox.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Явно отписаться. Повторный вызов безопасен.
    ///
    /// Возвращает `true`, если запись была удалена именно этим вызовом.
    pub fn unsubscribe(&self) -> bool {
        release(&self.registry, &self.topic, self.id, &self.mailbox)
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Ждёт отписки или отмены через [`CancelHandle`], не вычитывая буфер.
    pub async fn closed(&self) {
        self.mailbox.closed().await
    }

    /// Количество событий в буфере.
    pub fn len(&self) -> usize {
        self.mailbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            delivered: self.mailbox.delivered(),
            dropped: self.mailbox.dropped(),
            buffered: self.mailbox.len(),
        }
    }
}

impl CancelHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn cancel(&self) -> bool {
        release(&self.registry, &self.topic, self.id, &self.mailbox)
    }

    pub fn is_cancelled(&self) -> bool {
        self.mailbox.is_closed()
    }
}

/// Удаляет запись из реестра и закрывает канал.
///
/// Канал закрывается даже если записи уже нет (например, после
/// `unsubscribe_all`), чтобы потребитель гарантированно получил `None`.
fn release(
    registry: &TopicRegistry,
    topic: &str,
    id: SubscriptionId,
    mailbox: &Mailbox,
) -> bool {
    let removed = registry.remove(topic, id);
    mailbox.close();
    removed
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.unsubscribe() {
            tracing::trace!(subscription = %self.id, topic = %self.topic, "subscription released on drop");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &&*self.topic)
            .field("policy", &self.mailbox.policy())
            .field("closed", &self.mailbox.is_closed())
            .finish()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.id)
            .field("topic", &&*self.topic)
            .finish()
    }
}
