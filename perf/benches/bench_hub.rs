use cairn_channel::{CancelToken, Hub, HubConfig};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

fn bench_broadcast_no_subscribers(c: &mut Criterion) {
    let cancel = CancelToken::new();
    let hub = Hub::<u64>::new(&cancel, HubConfig::default());

    let mut group = c.benchmark_group("hub");
    group.throughput(Throughput::Elements(1));
    group.bench_function("broadcast (no subscribers)", |b| {
        b.iter(|| hub.broadcast(black_box(7)));
    });
    group.finish();

    cancel.cancel();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_fan_out");

    for clients in [1usize, 4, 16] {
        let cancel = CancelToken::new();
        let hub = Hub::<u64>::new(
            &cancel,
            HubConfig {
                broadcast_buffer: 1024,
                client_buffer: 1024,
            },
        );
        let subscribers: Vec<_> = (0..clients).map(|_| hub.register()).collect();

        group.throughput(Throughput::Elements(clients as u64));
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, _| {
            b.iter_custom(|iters| {
                let start = std::time::Instant::now();
                for i in 0..iters {
                    hub.broadcast(i);
                    for s in &subscribers {
                        black_box(s.recv().ok());
                    }
                }
                start.elapsed()
            });
        });

        for s in subscribers {
            hub.release(s);
        }
        cancel.cancel();
    }

    group.finish();
}

fn bench_register(c: &mut Criterion) {
    let cancel = CancelToken::new();
    let hub = Hub::<u64>::new(&cancel, HubConfig::default());

    let mut group = c.benchmark_group("hub");
    group.bench_function("register + release", |b| {
        b.iter(|| hub.release(hub.register()));
    });
    group.finish();

    cancel.cancel();
}

criterion_group!(
    benches,
    bench_broadcast_no_subscribers,
    bench_fan_out,
    bench_register,
);
criterion_main!(benches);
