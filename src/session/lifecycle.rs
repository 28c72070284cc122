use std::future::Future;

use tracing::{debug, info, warn};

use super::{CloseReason, EventSink, SessionState};
use crate::{
    pubsub::{CancelHandle, DeliveryPolicy, Subscription, SubscriptionId, TopicRegistry},
    SessionError,
};

/// Итог завершённой сессии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SubscriptionId,
    pub topic: String,
    pub reason: CloseReason,
    /// Событий успешно передано в sink
    pub delivered: u64,
    /// Событий потеряно из-за переполнения буфера подписки
    pub dropped: u64,
    pub final_state: SessionState,
}

/// Жизненный цикл одного долгоживущего подписчика.
///
/// Сессия владеет подпиской и пересылает её события в [`EventSink`], пока
/// не случится одно из трёх: клиент отключится, подписку отменят или
/// доставка завершится ошибкой. После этого подписка снимается
/// безусловно, а сама сессия поглощается и не может быть возобновлена.
pub struct SubscriptionSession {
    registry: TopicRegistry,
    topic: String,
    policy: Option<DeliveryPolicy>,
    state: SessionState,
    subscription: Option<Subscription>,
}

impl SubscriptionSession {
    /// Создаёт сессию в состоянии `Pending`. Подписка ещё не создана.
    pub fn new(
        registry: TopicRegistry,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            topic: topic.into(),
            policy: None,
            state: SessionState::Pending,
            subscription: None,
        }
    }

    /// Политика доставки вместо политики реестра по умолчанию.
    pub fn with_policy(
        mut self,
        policy: DeliveryPolicy,
    ) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription.as_ref().map(Subscription::id)
    }

    /// Регистрирует подписку и переводит сессию в `Active`.
    ///
    /// Возвращает handle, через который сессию можно отменить из другой
    /// задачи.
    pub fn activate(&mut self) -> Result<CancelHandle, SessionError> {
        self.transition(SessionState::Active)?;
        let subscription = self.register();
        let cancel = subscription.cancel_handle();
        self.subscription = Some(subscription);
        Ok(cancel)
    }

    /// Создаёт подписку в реестре. Вызывается только из `Pending`:
    /// подписки нет ровно тогда, когда сессия ещё не активирована.
    fn register(&mut self) -> Subscription {
        let subscription = match self.policy {
            Some(policy) => self.registry.subscribe_with_policy(&self.topic, policy),
            None => self.registry.subscribe(&self.topic),
        };
        self.state = SessionState::Active;
        info!(
            subscription = %subscription.id(),
            topic = %self.topic,
            "session activated"
        );
        subscription
    }

    /// Handle отмены активной сессии.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.subscription.as_ref().map(Subscription::cancel_handle)
    }

    /// Основной цикл: пересылает события в `sink` до отключения, отмены
    /// или ошибки доставки.
    ///
    /// `disconnect` завершается, когда транспорт клиента закрыт. Сессия в
    /// `Pending` активируется автоматически.
    ///
    /// Отключение и отмена замечаются и во время ожидания события, и во
    /// время зависшей доставки: незавершённая доставка при этом
    /// сбрасывается. После отмены оставшиеся в буфере события клиенту уже
    /// не пересылаются.
    pub async fn run<K, D>(
        mut self,
        sink: &mut K,
        disconnect: D,
    ) -> SessionSummary
    where
        K: EventSink + ?Sized,
        D: Future<Output = ()>,
    {
        let mut subscription = match self.subscription.take() {
            Some(subscription) => subscription,
            None => self.register(),
        };

        tokio::pin!(disconnect);
        let mut delivered = 0u64;

        let reason = loop {
            if subscription.is_closed() {
                break CloseReason::Cancelled;
            }

            let event = tokio::select! {
                biased;

                _ = &mut disconnect => break CloseReason::TransportClosed,

                next = subscription.recv() => match next {
                    Some(event) => event,
                    None => break CloseReason::Cancelled,
                },
            };

            tokio::select! {
                biased;

                _ = &mut disconnect => break CloseReason::TransportClosed,

                _ = subscription.closed() => break CloseReason::Cancelled,

                result = sink.deliver(&event) => match result {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(
                            subscription = %subscription.id(),
                            topic = %self.topic,
                            error = %e,
                            "event delivery failed"
                        );
                        break CloseReason::DeliveryFailed(e);
                    }
                },
            }
        };

        let _ = self.transition(SessionState::Closing);
        subscription.unsubscribe();
        let id = subscription.id();
        let dropped = subscription.stats().dropped;
        drop(subscription);

        self.finish(id, reason, delivered, dropped)
    }

    fn finish(
        &mut self,
        id: SubscriptionId,
        reason: CloseReason,
        delivered: u64,
        dropped: u64,
    ) -> SessionSummary {
        if self.state != SessionState::Closing {
            let _ = self.transition(SessionState::Closing);
        }
        let _ = self.transition(SessionState::Terminated);

        info!(
            subscription = %id,
            topic = %self.topic,
            reason = reason.as_str(),
            delivered,
            dropped,
            "session terminated"
        );

        SessionSummary {
            id,
            topic: self.topic.clone(),
            reason,
            delivered,
            dropped,
            final_state: self.state,
        }
    }

    fn transition(
        &mut self,
        next: SessionState,
    ) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!(topic = %self.topic, from = %self.state, to = %next, "session state change");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::{
        sync::{mpsc, oneshot},
        time::timeout,
    };

    use super::*;
    use crate::{
        pubsub::{Event, EventPayload},
        DeliveryError,
    };

    fn json(n: i64) -> EventPayload {
        EventPayload::Json(json!(n))
    }

    /// Sink, который падает на `fail_at`-м событии.
    struct FailingSink {
        seen: u64,
        fail_at: u64,
    }

    #[async_trait]
    impl EventSink for FailingSink {
        async fn deliver(
            &mut self,
            _event: &Event,
        ) -> Result<(), DeliveryError> {
            self.seen += 1;
            if self.seen >= self.fail_at {
                return Err(DeliveryError::Write {
                    reason: "peer reset".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_activate_twice_is_rejected() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        assert_eq!(session.state(), SessionState::Pending);

        session.activate().unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(registry.subscriber_count("t"), 1);

        let err = session.activate().unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(registry.subscriber_count("t"), 1);
    }

    /// Тест проверяет завершение по отключению транспорта.
    #[tokio::test]
    async fn test_run_until_disconnect() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        session.activate().unwrap();

        let (mut tx, mut rx) = mpsc::channel(16);
        let (closed_tx, closed_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            session
                .run(&mut tx, async {
                    let _ = closed_rx.await;
                })
                .await
        });

        registry.publish("t", json(1));
        registry.publish("t", json(2));
        assert_eq!(rx.recv().await.unwrap().payload(), &json(1));
        assert_eq!(rx.recv().await.unwrap().payload(), &json(2));

        closed_tx.send(()).unwrap();
        let summary = timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not stop")
            .unwrap();

        assert_eq!(summary.reason, CloseReason::TransportClosed);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.final_state, SessionState::Terminated);
        assert_eq!(registry.subscriber_count("t"), 0);
    }

    /// Тест проверяет отмену из другой задачи.
    #[tokio::test]
    async fn test_run_until_cancelled() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        let cancel = session.activate().unwrap();

        let (mut tx, _rx) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            session
                .run(&mut tx, std::future::pending::<()>())
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cancel.cancel());

        let summary = timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not stop")
            .unwrap();
        assert_eq!(summary.reason, CloseReason::Cancelled);
        assert_eq!(registry.topic_count(), 0);
    }

    /// Тест проверяет, что события, буферизованные до отмены, клиенту уже
    /// не пересылаются.
    #[tokio::test]
    async fn test_cancel_before_run_forwards_nothing() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        let cancel = session.activate().unwrap();

        registry.publish("t", json(1));
        registry.publish("t", json(2));
        cancel.cancel();

        let (mut tx, mut rx) = mpsc::channel(16);
        let summary = session.run(&mut tx, std::future::pending::<()>()).await;
        assert_eq!(summary.reason, CloseReason::Cancelled);
        assert_eq!(summary.delivered, 0);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    /// Тест проверяет, что ошибка доставки закрывает только свою сессию.
    #[tokio::test]
    async fn test_delivery_failure_is_local() {
        let registry = TopicRegistry::default();

        let failing = SubscriptionSession::new(registry.clone(), "t");
        let mut healthy = registry.subscribe("t");

        let task = tokio::spawn(async move {
            let mut sink = FailingSink {
                seen: 0,
                fail_at: 2,
            };
            failing.run(&mut sink, std::future::pending::<()>()).await
        });

        // Ждём, пока сессия зарегистрирует подписку.
        while registry.subscriber_count("t") < 2 {
            tokio::task::yield_now().await;
        }

        registry.publish("t", json(1));
        let report = registry.publish("t", json(2));
        assert_eq!(report.subscribers, 2);

        let summary = timeout(Duration::from_secs(1), task)
            .await
            .expect("session did not stop")
            .unwrap();
        assert!(matches!(
            summary.reason,
            CloseReason::DeliveryFailed(DeliveryError::Write { .. })
        ));
        assert_eq!(summary.delivered, 1);

        assert_eq!(registry.subscriber_count("t"), 1);
        registry.publish("t", json(3));
        let got: Vec<_> = std::iter::from_fn(|| healthy.try_recv().ok())
            .map(|e| e.payload().clone())
            .collect();
        assert_eq!(got, vec![json(1), json(2), json(3)]);
    }

    /// Тест проверяет, что отключение замечается, пока доставка висит на
    /// переполненном канале, который никто не читает.
    #[tokio::test]
    async fn test_disconnect_during_stalled_delivery() {
        let registry = TopicRegistry::default();
        let session = SubscriptionSession::new(registry.clone(), "t");

        let (mut tx, _rx) = mpsc::channel(1);
        let (closed_tx, closed_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            session
                .run(&mut tx, async {
                    let _ = closed_rx.await;
                })
                .await
        });
        while registry.subscriber_count("t") == 0 {
            tokio::task::yield_now().await;
        }

        registry.publish("t", json(1));
        registry.publish("t", json(2));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        closed_tx.send(()).unwrap();
        let summary = timeout(Duration::from_secs(1), task)
            .await
            .expect("session stuck in delivery after disconnect")
            .unwrap();
        assert_eq!(summary.reason, CloseReason::TransportClosed);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.final_state, SessionState::Terminated);
        assert_eq!(registry.subscriber_count("t"), 0);
    }

    /// Тест проверяет отмену через handle во время зависшей доставки.
    #[tokio::test]
    async fn test_cancel_during_stalled_delivery() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        let cancel = session.activate().unwrap();

        let (mut tx, _rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            session
                .run(&mut tx, std::future::pending::<()>())
                .await
        });

        registry.publish("t", json(1));
        registry.publish("t", json(2));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        assert!(cancel.cancel());
        let summary = timeout(Duration::from_secs(1), task)
            .await
            .expect("session stuck in delivery after cancel")
            .unwrap();
        assert_eq!(summary.reason, CloseReason::Cancelled);
        assert_eq!(summary.delivered, 1);
        assert_eq!(registry.subscriber_count("t"), 0);
    }

    /// Тест проверяет, что `run` из `Pending` сам регистрирует подписку и
    /// отдаёт в итоге её настоящий идентификатор.
    #[tokio::test]
    async fn test_run_from_pending_registers_subscription() {
        let registry = TopicRegistry::default();
        let _earlier = registry.subscribe("t");
        let session = SubscriptionSession::new(registry.clone(), "t");
        assert_eq!(session.subscription_id(), None);

        let (closed_tx, closed_rx) = oneshot::channel::<()>();
        let (mut tx, _rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            session
                .run(&mut tx, async {
                    let _ = closed_rx.await;
                })
                .await
        });
        while registry.subscriber_count("t") < 2 {
            tokio::task::yield_now().await;
        }
        closed_tx.send(()).unwrap();

        let summary = task.await.unwrap();
        assert_eq!(summary.id.as_u64(), 2);
        assert_eq!(summary.final_state, SessionState::Terminated);
        assert_eq!(registry.subscriber_count("t"), 1);
    }

    /// Тест проверяет, что прерванная задача сессии всё равно снимает
    /// подписку.
    #[tokio::test]
    async fn test_aborted_session_releases_subscription() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t");
        session.activate().unwrap();

        let task = tokio::spawn(async move {
            let (mut tx, _rx) = mpsc::channel(1);
            session.run(&mut tx, std::future::pending::<()>()).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.abort();
        let _ = task.await;

        assert_eq!(registry.subscriber_count("t"), 0);
    }

    #[tokio::test]
    async fn test_summary_reports_drops() {
        let registry = TopicRegistry::default();
        let mut session = SubscriptionSession::new(registry.clone(), "t")
            .with_policy(DeliveryPolicy::drop_oldest(1));
        let cancel = session.activate().unwrap();

        registry.publish("t", json(1));
        registry.publish("t", json(2));
        registry.publish("t", json(3));
        cancel.cancel();

        let (mut tx, _rx) = mpsc::channel(4);
        let summary = session.run(&mut tx, std::future::pending::<()>()).await;
        assert_eq!(summary.dropped, 2);
    }
}
