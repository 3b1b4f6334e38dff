//! Scheduler throughput benches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use unilio::{spawn_detached, IoContext, Scheduler, Task};

fn post_drain(criterion: &mut Criterion) {
    criterion.bench_function("post_drain_1000", |b| {
        b.iter(|| {
            let sched = Scheduler::new();
            let counter = Arc::new(AtomicU64::new(0));
            for _ in 0..1000 {
                let counter = counter.clone();
                sched.post(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
            sched.stop();
            sched.run();
            assert_eq!(counter.load(Ordering::Relaxed), 1000);
        })
    });
}

fn detached_tasks(criterion: &mut Criterion) {
    criterion.bench_function("detached_tasks_100", |b| {
        b.iter(|| {
            let ctx = IoContext::new();
            let counter = Arc::new(AtomicU64::new(0));
            for _ in 0..100 {
                let counter = counter.clone();
                spawn_detached(
                    &ctx,
                    Task::new(async move {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }),
                );
            }
            let stopper = ctx.clone();
            ctx.post(move || stopper.stop());
            ctx.run();
            assert_eq!(counter.load(Ordering::Relaxed), 100);
        })
    });
}

criterion_group!(benches, post_drain, detached_tasks);
criterion_main!(benches);
