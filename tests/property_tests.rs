//! Property-based tests для доставки событий
//!
//! Генерируют случайные последовательности публикаций и политики буфера и
//! проверяют порядок и правила вытеснения для каждой подписки.

use proptest::prelude::*;
use serde_json::json;

use livecast::{DeliveryPolicy, EventPayload, OverflowPolicy, Subscription, TopicRegistry};

const PROPTEST_CASES: u32 = 256;

fn ev(n: u32) -> EventPayload {
    EventPayload::Json(json!(n))
}

fn seq(payload: &EventPayload) -> u32 {
    match payload {
        EventPayload::Json(v) => v.as_u64().map(|n| n as u32).unwrap_or(u32::MAX),
        EventPayload::Vehicle(_) => u32::MAX,
    }
}

fn drain(sub: &mut Subscription) -> Vec<u32> {
    std::iter::from_fn(|| sub.try_recv().ok())
        .map(|e| seq(e.payload()))
        .collect()
}

fn overflow_strategy() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![Just(OverflowPolicy::DropOldest), Just(OverflowPolicy::DropNewest)]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROPTEST_CASES,
        .. ProptestConfig::default()
    })]

    /// Без ограничения буфера подписчик получает все события в порядке
    /// публикации.
    #[test]
    fn prop_unbounded_delivers_everything_in_order(count in 0u32..500) {
        let registry = TopicRegistry::new(DeliveryPolicy::Unbounded);
        let mut sub = registry.subscribe("t");
        for n in 0..count {
            registry.publish("t", ev(n));
        }
        prop_assert_eq!(drain(&mut sub), (0..count).collect::<Vec<_>>());
        prop_assert_eq!(registry.stats().dropped_count, 0);
    }

    /// Ограниченный буфер сохраняет непрерывный отрезок публикаций:
    /// последние `capacity` при вытеснении старых и первые при отбрасывании
    /// новых.
    #[test]
    fn prop_bounded_keeps_contiguous_window(
        count in 0u32..300,
        capacity in 1usize..32,
        overflow in overflow_strategy(),
    ) {
        let registry = TopicRegistry::default();
        let mut sub = registry.subscribe_with_policy("t", DeliveryPolicy::bounded(capacity, overflow));
        for n in 0..count {
            registry.publish("t", ev(n));
        }

        let kept = (count as usize).min(capacity) as u32;
        let expected: Vec<u32> = match overflow {
            OverflowPolicy::DropOldest => (count - kept..count).collect(),
            OverflowPolicy::DropNewest => (0..kept).collect(),
        };
        prop_assert_eq!(drain(&mut sub), expected);
        prop_assert_eq!(sub.stats().dropped, u64::from(count - kept));
    }

    /// Чередование публикаций и чтения не нарушает порядок: полученные
    /// номера строго возрастают.
    #[test]
    fn prop_interleaved_reads_stay_ordered(
        batches in prop::collection::vec(1u32..20, 1..20),
        capacity in 1usize..16,
        overflow in overflow_strategy(),
    ) {
        let registry = TopicRegistry::default();
        let mut sub = registry.subscribe_with_policy("t", DeliveryPolicy::bounded(capacity, overflow));
        let mut next = 0u32;
        let mut received = Vec::new();
        for batch in batches {
            for _ in 0..batch {
                registry.publish("t", ev(next));
                next += 1;
            }
            received.extend(drain(&mut sub));
        }
        prop_assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    /// Подписчики с разными политиками независимы: переполнение одного не
    /// влияет на другого.
    #[test]
    fn prop_subscribers_are_isolated(count in 0u32..200, capacity in 1usize..8) {
        let registry = TopicRegistry::new(DeliveryPolicy::Unbounded);
        let mut slow = registry.subscribe_with_policy("t", DeliveryPolicy::drop_oldest(capacity));
        let mut full = registry.subscribe("t");
        for n in 0..count {
            registry.publish("t", ev(n));
        }
        prop_assert_eq!(drain(&mut full), (0..count).collect::<Vec<_>>());
        prop_assert!(drain(&mut slow).len() <= capacity);
    }
}
