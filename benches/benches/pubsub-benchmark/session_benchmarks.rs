use std::{hint::black_box, time::Duration};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use livecast::{
    session::encode_frame, DeliveryPolicy, Event, EventPayload, JsonLinesSink, SubscriptionSession,
    TopicRegistry, Vehicle,
};
use tokio::{io::AsyncReadExt, runtime::Runtime};

fn vehicle_event() -> Event {
    Event::new(
        "entity-location-updated",
        EventPayload::Vehicle(Vehicle {
            id: "42".into(),
            name: "bus-12".into(),
            latitude: 55.7558,
            longitude: 37.6173,
        }),
    )
}

fn bench_encode_frame(c: &mut Criterion) {
    let event = vehicle_event();
    c.bench_function("encode_frame_vehicle", |b| {
        b.iter(|| black_box(encode_frame(black_box(&event))))
    });
}

/// Полный путь: публикация, сессия, кодирование и запись в duplex-поток.
fn bench_session_forwarding(c: &mut Criterion) {
    const EVENTS: u64 = 1_000;

    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => panic!("failed to build tokio runtime: {e}"),
    };

    let mut group = c.benchmark_group("session_forwarding");
    group.throughput(Throughput::Elements(EVENTS));
    group.bench_function("duplex_1000_events", |b| {
        b.to_async(&rt).iter(|| async {
            let registry = TopicRegistry::new(DeliveryPolicy::Unbounded);
            let mut session = SubscriptionSession::new(registry.clone(), "entity-location-updated");
            let cancel = session.activate().expect("fresh session activates");

            let (client, server) = tokio::io::duplex(64 * 1024);
            let reader = tokio::spawn(async move {
                let mut client = client;
                let mut buf = vec![0u8; 64 * 1024];
                let mut lines = 0u64;
                while lines < EVENTS {
                    let n = client.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    lines += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
                }
                lines
            });

            let runner = tokio::spawn(async move {
                let mut sink = JsonLinesSink::new(server, Duration::from_secs(5));
                session.run(&mut sink, std::future::pending()).await
            });

            for _ in 0..EVENTS {
                registry.publish("entity-location-updated", vehicle_event().payload().clone());
                tokio::task::yield_now().await;
            }

            black_box(reader.await.unwrap_or(0));
            cancel.cancel();
            black_box(runner.await.ok());
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encode_frame, bench_session_forwarding);
criterion_main!(benches);
