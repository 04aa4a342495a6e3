use cairn_set::RigidSet;
use cairn_slice::Rigid;
use cairn_maps::Locked;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

fn bench_rigid_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("rigid_add");
    group.throughput(Throughput::Elements(1));

    for capacity in [16usize, 1024] {
        let rigid = Rigid::<u64, Locked>::new(capacity);
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("rigid", capacity), &capacity, |b, _| {
            b.iter(|| {
                next += 1;
                black_box(rigid.add([next]))
            });
        });

        let set = RigidSet::<u64, Locked>::new(capacity);
        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("rigid_set", capacity), &capacity, |b, _| {
            b.iter(|| {
                next += 1;
                black_box(set.add([next % (capacity as u64 * 2)]))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rigid_add);
criterion_main!(benches);
