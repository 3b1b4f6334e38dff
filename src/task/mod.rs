//! Lazy task values and the scheduler-driven cell that runs detached
//! tasks.

pub(crate) mod waker;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use crate::scheduler::Scheduler;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A lazy asynchronous computation producing `T`.
///
/// A task owns its future and runs no user code until it is awaited or
/// started. Awaiting a task polls the future inline in the awaiter's
/// frame, so completion hands the value straight back without touching
/// the scheduler queue. [`start`](Task::start) instead releases the
/// future to a scheduler to run detached.
///
/// A task has exactly one consumer: `.await` takes it by value, and
/// polling after completion panics.
pub struct Task<T> {
    fut: Option<BoxFuture<T>>,
}

impl<T> Task<T> {
    /// Wrap a future. Nothing runs until the first poll.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            fut: Some(Box::pin(fut)),
        }
    }

    /// Whether this task still holds its future.
    pub fn valid(&self) -> bool {
        self.fut.is_some()
    }

    /// Hand the task to `sched` to run detached.
    ///
    /// Ownership of the future is released: its output is dropped on
    /// completion and the frame is freed by the runtime. If the scheduler
    /// is gone before the task completes, the future is dropped unrun.
    pub fn start(mut self, sched: &Arc<Scheduler>)
    where
        T: Send + 'static,
    {
        if let Some(fut) = self.fut.take() {
            ScheduledTask::new(sched, async move {
                let _ = fut.await;
            })
            .schedule();
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("valid", &self.valid()).finish()
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        let fut = this.fut.as_mut().expect("task polled after completion");
        match fut.as_mut().poll(cx) {
            Poll::Ready(value) => {
                this.fut = None;
                Poll::Ready(value)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A detached future driven by the scheduler.
///
/// Wakes re-post the cell onto the queue; completion clears the slot so
/// the frame is dropped exactly once. The scheduler is held weakly: a
/// wake arriving after the runtime is gone drops the future instead of
/// queueing it.
pub(crate) struct ScheduledTask {
    fut: Mutex<Option<BoxFuture<()>>>,
    sched: Weak<Scheduler>,
}

impl ScheduledTask {
    pub(crate) fn new<F>(sched: &Arc<Scheduler>, fut: F) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Arc::new(Self {
            fut: Mutex::new(Some(Box::pin(fut))),
            sched: Arc::downgrade(sched),
        })
    }

    /// Post one poll of this cell onto its scheduler.
    pub(crate) fn schedule(self: Arc<Self>) {
        if let Some(sched) = self.sched.upgrade() {
            sched.post(move || self.poll_once());
        } else {
            tracing::trace!("scheduler gone; dropping detached task");
        }
    }

    fn poll_once(self: Arc<Self>) {
        let waker = waker::scheduler_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.fut.lock().expect("task cell lock poisoned");
        if let Some(fut) = slot.as_mut() {
            if fut.as_mut().poll(&mut cx).is_ready() {
                *slot = None;
            }
        }
    }
}
