use std::thread;
use std::time::{Duration, Instant};

use unilio::{spawn_detached, CancelToken, IoContext, Task};

#[test]
fn sleep_waits_at_least_the_duration() {
    let ctx = IoContext::new();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            let started = Instant::now();
            ctx2.timers().sleep(Duration::from_millis(50)).await;
            tx.send(started.elapsed()).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert!(rx.recv().unwrap() >= Duration::from_millis(50));
}

#[test]
fn zero_duration_sleep_is_fast() {
    let ctx = IoContext::new();
    let ctx2 = ctx.clone();
    let started = Instant::now();

    spawn_detached(
        &ctx,
        Task::new(async move {
            ctx2.timers().sleep(Duration::from_millis(0)).await;
            ctx2.stop();
        }),
    );

    ctx.run();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn sleeps_fire_in_deadline_order() {
    let ctx = IoContext::new();
    let (tx, rx) = flume::unbounded();

    for (label, ms) in [("slow", 60u64), ("fast", 10u64)] {
        let ctx2 = ctx.clone();
        let tx = tx.clone();
        spawn_detached(
            &ctx,
            Task::new(async move {
                ctx2.timers().sleep(Duration::from_millis(ms)).await;
                tx.send(label).ok();
            }),
        );
    }

    let stopper = ctx.clone();
    spawn_detached(
        &ctx,
        Task::new(async move {
            stopper.timers().sleep(Duration::from_millis(120)).await;
            stopper.stop();
        }),
    );

    ctx.run();
    assert_eq!(rx.try_recv().unwrap(), "fast");
    assert_eq!(rx.try_recv().unwrap(), "slow");
}

/// Timer wakeup chained into a pool hand-off, finishing back on the loop
/// thread.
#[test]
fn timer_then_pool_echo() {
    let ctx = IoContext::new();
    let main_id = thread::current().id();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            let started = Instant::now();
            ctx2.timers().sleep(Duration::from_millis(50)).await;
            assert!(started.elapsed() >= Duration::from_millis(50));

            let sum = ctx2
                .cpu_pool()
                .submit(
                    || (0..100_000u64).map(|i| i % 7).sum::<u64>(),
                    CancelToken::default(),
                )
                .await
                .expect("pool job failed");

            assert_eq!(thread::current().id(), main_id);
            tx.send(sum).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert!(rx.recv().unwrap() > 0);
}
