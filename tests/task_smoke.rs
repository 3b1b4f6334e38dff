use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use unilio::{spawn_detached, Error, IoContext, Task};

fn compute() -> Task<i32> {
    Task::new(async { 42 })
}

fn add_one(x: i32) -> Task<i32> {
    Task::new(async move { x + 1 })
}

fn chain() -> Task<i32> {
    Task::new(async {
        let v = compute().await;
        add_one(v).await
    })
}

#[test]
fn chained_tasks_yield_43() {
    let ctx = IoContext::new();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            let v = chain().await;
            tx.send(v).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert_eq!(rx.recv().unwrap(), 43);
}

#[test]
fn failure_propagates_to_await_site() {
    fn boom() -> Task<Result<(), Error>> {
        Task::new(async { Err(Error::from(std::io::Error::other("boom"))) })
    }

    fn outer() -> Task<Result<(), Error>> {
        Task::new(async {
            boom().await?;
            Ok(())
        })
    }

    let ctx = IoContext::new();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            tx.send(outer().await).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    let err = rx.recv().unwrap().unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[test]
fn lazy_start_runs_no_user_code() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let task = Task::new(async move {
        flag.store(true, Ordering::SeqCst);
    });
    assert!(task.valid());

    // Dropping an unstarted task must not run its body.
    drop(task);
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn move_out_returns_stored_value() {
    struct Payload(String); // deliberately not Clone

    let ctx = IoContext::new();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            let payload = Task::new(async { Payload(String::from("move-me")) }).await;
            tx.send(payload.0).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert_eq!(rx.recv().unwrap(), "move-me");
}

#[test]
fn detached_frame_is_destroyed() {
    struct Guard(Arc<AtomicBool>);

    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let ctx = IoContext::new();
    let dropped = Arc::new(AtomicBool::new(false));
    let guard = Guard(dropped.clone());

    let task = Task::new(async move {
        let _guard = guard;
    });
    task.start(ctx.scheduler());

    let stopper = ctx.clone();
    ctx.post(move || stopper.stop());
    ctx.run();

    assert!(dropped.load(Ordering::SeqCst));
}
