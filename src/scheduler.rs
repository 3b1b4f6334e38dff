//! Single-threaded FIFO job loop that drives all user futures.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Condvar, Mutex};
use std::task::{Context, Poll};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread-safe FIFO job queue with a blocking [`run`](Scheduler::run)
/// loop.
///
/// Producers on any thread hand work to the loop thread via
/// [`post`](Scheduler::post); coroutine resumptions funnel through the
/// same queue, which is what keeps user futures on a single thread.
pub struct Scheduler {
    state: Mutex<SchedState>,
    cv: Condvar,
}

#[derive(Default)]
struct SchedState {
    jobs: VecDeque<Job>,
    stop_requested: bool,
    running: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedState::default()),
            cv: Condvar::new(),
        }
    }

    /// Enqueue a job at the tail of the queue and wake the loop. Never
    /// blocks beyond the queue lock.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.jobs.push_back(Box::new(job));
        }
        self.cv.notify_one();
    }

    /// Run the job loop on the calling thread until [`stop`](Self::stop)
    /// is observed with an empty queue.
    ///
    /// Jobs execute outside the lock, in post order. Jobs already queued
    /// when the stop flag is raised are still drained; jobs posted after
    /// the loop has exited stay queued and never run.
    pub fn run(&self) {
        tracing::debug!(
            "scheduler loop entered on {:?}",
            std::thread::current().id()
        );
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.running = true;
        }

        loop {
            let job = {
                let mut state = self.state.lock().expect("scheduler lock poisoned");
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        break Some(job);
                    }
                    if state.stop_requested {
                        break None;
                    }
                    state = self.cv.wait(state).expect("scheduler lock poisoned");
                }
            };

            match job {
                Some(job) => job(),
                None => break,
            }
        }

        let mut state = self.state.lock().expect("scheduler lock poisoned");
        state.running = false;
        tracing::debug!("scheduler loop exited");
    }

    /// Ask the loop to exit once the queue is drained. Wakes all waiters;
    /// pending jobs are not dropped.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state.stop_requested = true;
        }
        self.cv.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("scheduler lock poisoned").running
    }

    /// Number of jobs currently queued.
    pub fn pending(&self) -> usize {
        self.state.lock().expect("scheduler lock poisoned").jobs.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`yield_now`].
#[derive(Debug, Default)]
pub struct YieldNow {
    yielded: bool,
}

/// Re-enqueue the current task at the tail of its scheduler queue,
/// letting other queued jobs run first.
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
