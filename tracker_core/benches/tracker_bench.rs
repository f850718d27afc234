use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tracker_core::{EventSource, MultiPersonTracker, RoomGraph, TrackerConfig};

/// Ring of `n` rooms, each connected to the next.
fn ring(n: usize) -> RoomGraph {
    RoomGraph::from_adjacency(
        (0..n).map(|i| (format!("room_{i:03}"), vec![format!("room_{:03}", (i + 1) % n)])),
    )
    .expect("ring graph is valid")
}

fn populated(n_rooms: usize, n_people: usize) -> MultiPersonTracker {
    let mut mpt = MultiPersonTracker::new(ring(n_rooms), TrackerConfig::default())
        .expect("default config is valid");
    for p in 0..n_people {
        mpt.process_event(
            format!("person_{p}").as_str(),
            format!("room_{:03}", (p * 3) % n_rooms),
            0.0,
        )
        .expect("room exists");
    }
    mpt
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker");

    for n_people in [1, 8, 32] {
        group.bench_function(format!("step_{n_people}_people"), |b| {
            let mut mpt = populated(24, n_people);
            let mut t = 0.0;
            b.iter(|| {
                t += 30.0;
                mpt.step(black_box(t));
            });
        });

        group.bench_function(format!("ambient_event_{n_people}_people"), |b| {
            b.iter_batched(
                || populated(24, n_people),
                |mut mpt| {
                    mpt.process_event(EventSource::Ambient, "room_001", 5.0)
                        .expect("room exists")
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tracker);
criterion_main!(benches);
