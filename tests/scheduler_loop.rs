use std::sync::{Arc, Mutex};
use std::thread;

use unilio::{spawn_detached, yield_now, IoContext, Scheduler, Task};

#[test]
fn jobs_dispatch_in_fifo_order() {
    let sched = Scheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = order.clone();
        sched.post(move || order.lock().unwrap().push(i));
    }

    // Jobs queued before the stop request are still drained.
    sched.stop();
    sched.run();

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn pending_and_running_flags() {
    let sched = Arc::new(Scheduler::new());
    assert!(!sched.is_running());

    sched.post(|| {});
    sched.post(|| {});
    assert_eq!(sched.pending(), 2);

    let observer = sched.clone();
    let was_running = Arc::new(Mutex::new(false));
    let flag = was_running.clone();
    sched.post(move || {
        *flag.lock().unwrap() = observer.is_running();
    });

    sched.stop();
    sched.run();

    assert!(*was_running.lock().unwrap());
    assert!(!sched.is_running());
    assert_eq!(sched.pending(), 0);
}

#[test]
fn resumption_stays_on_loop_thread() {
    let ctx = IoContext::new();
    let main_id = thread::current().id();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            yield_now().await;
            tx.send(thread::current().id()).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert_eq!(rx.recv().unwrap(), main_id);
}

#[test]
fn yield_interleaves_tasks_fairly() {
    let ctx = IoContext::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b"] {
        let order = order.clone();
        spawn_detached(
            &ctx,
            Task::new(async move {
                order.lock().unwrap().push(format!("{name}1"));
                yield_now().await;
                order.lock().unwrap().push(format!("{name}2"));
            }),
        );
    }

    let stopper = ctx.clone();
    spawn_detached(
        &ctx,
        Task::new(async move {
            // Queued after both tasks, so they finish first.
            yield_now().await;
            yield_now().await;
            stopper.stop();
        }),
    );

    ctx.run();
    assert_eq!(*order.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);
}

#[test]
fn jobs_posted_after_stop_do_not_deadlock() {
    let sched = Scheduler::new();
    sched.stop();
    sched.run();

    // The loop has exited; a late post must neither run nor block.
    sched.post(|| panic!("must not run"));
    assert_eq!(sched.pending(), 1);
}
