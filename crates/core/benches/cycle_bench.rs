//! Per-cycle state transition benchmarks for pollwatch-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pollwatch_core::{classify, FileStat, IntervalController, WatchedFile};
use std::time::{Duration, UNIX_EPOCH};

fn stat(size: u64, secs: u64) -> FileStat {
    FileStat::new(size, UNIX_EPOCH + Duration::from_secs(secs))
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_write", |b| {
        b.iter(|| classify(black_box(stat(100, 1)), black_box(stat(200, 2))))
    });
}

fn bench_poll_cycle(c: &mut Criterion) {
    let controller = IntervalController::new(Duration::from_millis(500), Duration::from_secs(5));

    c.bench_function("poll_cycle_growing_file", |b| {
        let mut file = WatchedFile::new("bench.log", Duration::from_secs(1));
        let mut tick = 0u64;
        b.iter(|| {
            tick += 1;
            let transition = file.observe_present(stat(tick * 64, tick));
            file.finish_cycle(&controller);
            black_box(transition)
        });
    });

    c.bench_function("poll_cycle_idle_file", |b| {
        let mut file = WatchedFile::new("bench.log", Duration::from_secs(1));
        file.observe_present(stat(64, 1));
        b.iter(|| {
            let transition = file.observe_present(black_box(stat(64, 1)));
            file.finish_cycle(&controller);
            black_box(transition)
        });
    });
}

criterion_group!(benches, bench_classify, bench_poll_cycle);
criterion_main!(benches);
