use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

use super::{
    mailbox::{Mailbox, PushOutcome},
    DeliveryPolicy, Event, EventPayload, Subscription, SubscriptionId,
};

type TopicKey = Arc<str>;
type Members = HashMap<SubscriptionId, Arc<Mailbox>>;

/// Итог одного вызова `publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PublishReport {
    /// Подписчиков в теме на момент публикации
    pub subscribers: usize,
    /// Скольким подписчикам событие попало в буфер
    pub delivered: usize,
    /// Сколько событий потеряно из-за переполнения буферов
    pub dropped: usize,
}

/// Снимок счётчиков реестра.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub publish_count: u64,
    /// Публикаций в тему без подписчиков
    pub unrouted_count: u64,
    pub delivered_count: u64,
    pub dropped_count: u64,
    pub active_subscriptions: usize,
}

#[derive(Debug, Default)]
struct Counters {
    publish_count: AtomicU64,
    unrouted_count: AtomicU64,
    delivered_count: AtomicU64,
    dropped_count: AtomicU64,
    active_subscriptions: AtomicUsize,
}

struct RegistryInner {
    /// Тема → подписки. Реестр хранит только членство; каналом и циклом
    /// потребителя владеет сессия.
    topics: DashMap<TopicKey, Members>,
    next_id: AtomicU64,
    default_policy: DeliveryPolicy,
    counters: Counters,
}

/// Реестр тем и подписок.
///
/// Поддерживает:
/// - неявное создание темы при первой подписке
/// - удаление пустых тем при уходе последнего подписчика
/// - публикацию без блокировки на медленных потребителях
/// - статистику публикаций, доставок и потерь
///
/// Клонирование дешёвое: все клоны разделяют одно состояние.
#[derive(Clone)]
pub struct TopicRegistry {
    inner: Arc<RegistryInner>,
}

impl TopicRegistry {
    /// Создаёт реестр с политикой доставки по умолчанию для новых подписок.
    pub fn new(default_policy: DeliveryPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                topics: DashMap::new(),
                next_id: AtomicU64::new(0),
                default_policy,
                counters: Counters::default(),
            }),
        }
    }

    pub fn default_policy(&self) -> DeliveryPolicy {
        self.inner.default_policy
    }

    /// Подписка на тему с политикой реестра по умолчанию.
    pub fn subscribe(
        &self,
        topic: &str,
    ) -> Subscription {
        self.subscribe_with_policy(topic, self.inner.default_policy)
    }

    /// Подписка на тему с явной политикой доставки.
    ///
    /// Тема создаётся при первой подписке.
    pub fn subscribe_with_policy(
        &self,
        topic: &str,
        policy: DeliveryPolicy,
    ) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mailbox = Arc::new(Mailbox::new(policy));

        let key = {
            let mut members = self.inner.topics.entry(Arc::from(topic)).or_default();
            members.insert(id, mailbox.clone());
            members.key().clone()
        };
        let active = self
            .inner
            .counters
            .active_subscriptions
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        debug!(subscription = %id, topic, ?policy, active, "subscribed");
        Subscription::new(id, key, mailbox, self.clone())
    }

    /// Публикует событие всем текущим подписчикам темы.
    ///
    /// Публикация в тему без подписчиков не ошибка, а no-op. Вызов никогда
    /// не ждёт потребителей: переполнение обрабатывается политикой каждой
    /// подписки отдельно.
    pub fn publish(
        &self,
        topic: &str,
        payload: EventPayload,
    ) -> PublishReport {
        let counters = &self.inner.counters;
        counters.publish_count.fetch_add(1, Ordering::Relaxed);

        // Эксклюзивный guard: параллельные публикации в одну тему попадают ко
        // всем подписчикам в одном и том же порядке, а unsubscribe не может
        // изменить набор посреди рассылки.
        let Some(members) = self.inner.topics.get_mut(topic) else {
            counters.unrouted_count.fetch_add(1, Ordering::Relaxed);
            trace!(topic, "publish to topic without subscribers");
            return PublishReport::default();
        };

        let event_topic = members.key().clone();
        let payload = Arc::new(payload);
        let mut report = PublishReport {
            subscribers: members.len(),
            ..Default::default()
        };

        for (id, mailbox) in members.value().iter() {
            let outcome = mailbox.push(Event::from_shared(event_topic.clone(), payload.clone()));
            if outcome.accepted() {
                report.delivered += 1;
            }
            if outcome.lost() {
                report.dropped += 1;
                debug!(subscription = %id, topic, ?outcome, "subscriber buffer full, event dropped");
            }
            if outcome == PushOutcome::Closed {
                trace!(subscription = %id, topic, "skipping closed subscription");
            }
        }
        drop(members);

        counters
            .delivered_count
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        counters
            .dropped_count
            .fetch_add(report.dropped as u64, Ordering::Relaxed);

        trace!(
            topic,
            subscribers = report.subscribers,
            delivered = report.delivered,
            dropped = report.dropped,
            "published"
        );
        report
    }

    /// Убирает подписку из реестра. Идемпотентно.
    ///
    /// После возврата ни одна публикация до подписки не дойдёт; уже
    /// буферизованные события потребитель ещё может вычитать.
    pub fn unsubscribe(
        &self,
        subscription: &Subscription,
    ) -> bool {
        subscription.unsubscribe()
    }

    /// Удаляет запись о членстве. Пустая тема удаляется целиком.
    pub(crate) fn remove(
        &self,
        topic: &str,
        id: SubscriptionId,
    ) -> bool {
        // Guard `get_mut` живёт только до конца выражения, до `remove_if`.
        let removed = self
            .inner
            .topics
            .get_mut(topic)
            .and_then(|mut members| members.remove(&id));
        self.inner
            .topics
            .remove_if(topic, |_, members| members.is_empty());

        match removed {
            Some(mailbox) => {
                mailbox.close();
                let active = self
                    .inner
                    .counters
                    .active_subscriptions
                    .fetch_sub(1, Ordering::Relaxed)
                    - 1;
                debug!(subscription = %id, topic, active, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Закрывает все подписки темы и удаляет её.
    ///
    /// Потребители вычитывают буфер и получают `None`. Возвращает число
    /// закрытых подписок.
    pub fn unsubscribe_all(
        &self,
        topic: &str,
    ) -> usize {
        let Some((_, members)) = self.inner.topics.remove(topic) else {
            return 0;
        };
        let closed = members.len();
        for mailbox in members.values() {
            mailbox.close();
        }
        self.inner
            .counters
            .active_subscriptions
            .fetch_sub(closed, Ordering::Relaxed);
        debug!(topic, closed, "all subscriptions closed");
        closed
    }

    /// Закрывает все подписки во всех темах.
    pub fn close_all(&self) -> usize {
        let topics: Vec<TopicKey> = self.inner.topics.iter().map(|e| e.key().clone()).collect();
        topics.iter().map(|t| self.unsubscribe_all(t)).sum()
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.inner.topics.get(topic).map_or(0, |m| m.len())
    }

    /// Количество тем, у которых есть хотя бы один подписчик.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    /// Имена активных тем в отсортированном порядке.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .topics
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> RegistryStats {
        let c = &self.inner.counters;
        RegistryStats {
            publish_count: c.publish_count.load(Ordering::Relaxed),
            unrouted_count: c.unrouted_count.load(Ordering::Relaxed),
            delivered_count: c.delivered_count.load(Ordering::Relaxed),
            dropped_count: c.dropped_count.load(Ordering::Relaxed),
            active_subscriptions: c.active_subscriptions.load(Ordering::Relaxed),
        }
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics", &self.topic_count())
            .field("default_policy", &self.inner.default_policy)
            .field("stats", &self.stats())
            .finish()
    }
}
