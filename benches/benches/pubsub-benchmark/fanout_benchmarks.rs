use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use livecast::{DeliveryPolicy, EventPayload, Subscription, TopicRegistry};
use serde_json::json;

fn payload() -> EventPayload {
    EventPayload::Json(json!({ "id": "1", "latitude": 55.75, "longitude": 37.61 }))
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let registry = TopicRegistry::default();
    c.bench_function("subscribe_unsubscribe", |b| {
        b.iter(|| {
            let sub = registry.subscribe(black_box("topic"));
            black_box(sub.unsubscribe());
        })
    });
}

fn bench_publish_no_subscribers(c: &mut Criterion) {
    let registry = TopicRegistry::default();
    c.bench_function("publish_0_subs", |b| {
        b.iter(|| black_box(registry.publish("topic", payload())))
    });
}

/// Публикация в тему с N подписчиками; буферы вычитываются после каждой
/// итерации, чтобы мерить постановку в очередь, а не вытеснение.
fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fanout");
    for subscribers in [1usize, 10, 100, 1_000] {
        let registry = TopicRegistry::new(DeliveryPolicy::Unbounded);
        let mut subs: Vec<Subscription> = (0..subscribers)
            .map(|_| registry.subscribe("topic"))
            .collect();

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    black_box(registry.publish("topic", payload()));
                    for sub in subs.iter_mut() {
                        while sub.try_recv().is_ok() {}
                    }
                })
            },
        );
    }
    group.finish();
}

/// Переполненный буфер: каждая публикация вытесняет одно событие.
fn bench_publish_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_overflow");
    for (name, policy) in [
        ("drop_oldest", DeliveryPolicy::drop_oldest(64)),
        ("drop_newest", DeliveryPolicy::drop_newest(64)),
    ] {
        let registry = TopicRegistry::new(policy);
        let _subs: Vec<Subscription> = (0..10).map(|_| registry.subscribe("topic")).collect();
        for _ in 0..64 {
            registry.publish("topic", payload());
        }
        group.bench_function(name, |b| {
            b.iter(|| black_box(registry.publish("topic", payload())))
        });
    }
    group.finish();
}

fn bench_publish_many_topics(c: &mut Criterion) {
    let registry = TopicRegistry::new(DeliveryPolicy::drop_oldest(16));
    let topics: Vec<String> = (0..256).map(|i| format!("topic-{i}")).collect();
    let _subs: Vec<Subscription> = topics.iter().map(|t| registry.subscribe(t)).collect();

    c.bench_function("publish_256_topics_round_robin", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let topic = &topics[i % topics.len()];
            i += 1;
            black_box(registry.publish(topic, payload()))
        })
    });
}

criterion_group!(
    benches,
    bench_subscribe_unsubscribe,
    bench_publish_no_subscribers,
    bench_publish_fanout,
    bench_publish_overflow,
    bench_publish_many_topics,
);
criterion_main!(benches);
