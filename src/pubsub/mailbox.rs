use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::Event;
use crate::TryRecvError;

/// Что делать с событием, если буфер подписки заполнен.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Вытеснить самое старое событие из буфера и принять новое.
    #[default]
    DropOldest,
    /// Отбросить новое событие, буфер не меняется.
    DropNewest,
}

/// Политика буферизации канала доставки одной подписки.
///
/// По умолчанию: ограниченный буфер на [`DeliveryPolicy::DEFAULT_CAPACITY`]
/// событий с вытеснением старых. Доставка at-most-once: потерянное событие
/// не повторяется.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Без ограничения. `publish` никогда не теряет события, но память
    /// растёт, пока потребитель стоит.
    Unbounded,
    Bounded {
        capacity: NonZeroUsize,
        overflow: OverflowPolicy,
    },
}

impl DeliveryPolicy {
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Ограниченный буфер. Ёмкость `0` поднимается до `1`.
    pub fn bounded(
        capacity: usize,
        overflow: OverflowPolicy,
    ) -> Self {
        Self::Bounded {
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            overflow,
        }
    }

    pub fn drop_oldest(capacity: usize) -> Self {
        Self::bounded(capacity, OverflowPolicy::DropOldest)
    }

    pub fn drop_newest(capacity: usize) -> Self {
        Self::bounded(capacity, OverflowPolicy::DropNewest)
    }

    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded { capacity, .. } => Some(capacity.get()),
        }
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::drop_oldest(Self::DEFAULT_CAPACITY)
    }
}

/// Результат помещения события в буфер подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    /// Событие принято, самое старое вытеснено.
    DroppedOldest,
    /// Событие отброшено.
    DroppedNewest,
    /// Подписка уже закрыта.
    Closed,
}

impl PushOutcome {
    pub(crate) fn accepted(self) -> bool {
        matches!(self, Self::Queued | Self::DroppedOldest)
    }

    pub(crate) fn lost(self) -> bool {
        matches!(self, Self::DroppedOldest | Self::DroppedNewest)
    }
}

struct MailboxState {
    queue: VecDeque<Event>,
    closed: bool,
}

/// Канал доставки одной подписки: один производитель (реестр), один
/// потребитель (сессия).
///
/// Все изменения очереди и флага `closed` выполняются под одним мьютексом,
/// поэтому после `close()` ни одно событие уже не попадёт в буфер.
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
    notify: Notify,
    /// Будит всех, кто ждёт закрытия в [`Mailbox::closed`]
    closed_notify: Notify,
    policy: DeliveryPolicy,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Mailbox {
    pub(crate) fn new(policy: DeliveryPolicy) -> Self {
        let initial = policy.capacity().unwrap_or(16).min(16);
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::with_capacity(initial),
                closed: false,
            }),
            notify: Notify::new(),
            closed_notify: Notify::new(),
            policy,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Помещает событие в буфер согласно политике. Никогда не блокируется
    /// дольше, чем на время короткой критической секции.
    pub(crate) fn push(
        &self,
        event: Event,
    ) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            match self.policy {
                DeliveryPolicy::Unbounded => {
                    state.queue.push_back(event);
                    PushOutcome::Queued
                }
                DeliveryPolicy::Bounded { capacity, overflow } => {
                    if state.queue.len() < capacity.get() {
                        state.queue.push_back(event);
                        PushOutcome::Queued
                    } else {
                        match overflow {
                            OverflowPolicy::DropOldest => {
                                state.queue.pop_front();
                                state.queue.push_back(event);
                                PushOutcome::DroppedOldest
                            }
                            OverflowPolicy::DropNewest => PushOutcome::DroppedNewest,
                        }
                    }
                }
            }
        };

        if outcome.accepted() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            // Один потребитель: сохранённого permit достаточно, чтобы не
            // потерять пробуждение между try_pop и notified().
            self.notify.notify_one();
        }
        if outcome.lost() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Закрывает канал. Возвращает `false`, если он уже был закрыт.
    pub(crate) fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.notify.notify_one();
        self.closed_notify.notify_waiters();
        true
    }

    /// Завершается, когда канал закрыт. Не забирает события из буфера.
    pub(crate) async fn closed(&self) {
        let notified = self.closed_notify.notified();
        tokio::pin!(notified);
        loop {
            // Регистрация до проверки флага: `notify_waiters` не хранит permit.
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.closed_notify.notified());
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Забирает следующее событие. Уже буферизованные события отдаются и
    /// после закрытия; `Closed` возвращается только для пустого буфера.
    pub(crate) fn try_pop(&self) -> Result<Event, TryRecvError> {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(event) => Ok(event),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    pub(crate) async fn pop(&self) -> Option<Event> {
        loop {
            match self.try_pop() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => self.notify.notified().await,
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
