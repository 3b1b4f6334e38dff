//! CPU thread pool with awaitable submissions.

use std::collections::VecDeque;
use std::num::NonZero;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};
use crate::task::Task;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool of worker threads for closures that must not block the loop.
///
/// [`execute`](ThreadPool::execute) is fire-and-forget.
/// [`submit`](ThreadPool::submit) returns a lazy [`Task`]: the closure is
/// enqueued when the task is first polled, runs on a worker, and the
/// awaiting future resumes on the loop thread with the closure's value.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
    cv: Condvar,
}

#[derive(Default)]
struct PoolState {
    jobs: VecDeque<Job>,
    stop: bool,
}

enum Outcome<R> {
    Value(R),
    Canceled,
    Panicked(Box<dyn std::any::Any + Send>),
}

impl ThreadPool {
    /// One worker per available core, at least one.
    pub(crate) fn with_default_size() -> Self {
        let threads = thread::available_parallelism()
            .unwrap_or(NonZero::new(1usize).unwrap())
            .get();
        Self::new(threads)
    }

    #[tracing::instrument]
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
            cv: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|i| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("unilio-pool-{i}"))
                    .spawn(move || shared.worker_loop())
                    .expect("unable to spawn pool worker")
            })
            .collect();

        tracing::debug!("cpu pool started with {threads} workers");
        Self { shared, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }

    /// Enqueue `f` without a completion channel. Dropped silently when
    /// the pool has already been stopped.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.shared.try_enqueue(Box::new(f)) {
            tracing::trace!("pool stopped; dropping job");
        }
    }

    /// Run `f` on a worker and await its value from the loop thread.
    ///
    /// The returned task is lazy: nothing is enqueued until it is first
    /// polled. A token observed cancelled before the closure starts fails
    /// the await with [`ErrorKind::Canceled`]; a panic inside `f` resumes
    /// unwinding at the await site.
    pub fn submit<F, R>(&self, f: F, token: CancelToken) -> Task<Result<R, Error>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.shared.clone().submit(f, token)
    }

    /// Ask workers to exit once the queue is drained.
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.request_stop();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl PoolShared {
    pub(crate) fn submit<F, R>(self: Arc<Self>, f: F, token: CancelToken) -> Task<Result<R, Error>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Task::new(async move {
            if token.is_cancelled() {
                return Err(Error::from(ErrorKind::Canceled));
            }

            let (tx, rx) = flume::bounded(1);
            let job_token = token.clone();
            let enqueued = self.try_enqueue(Box::new(move || {
                let outcome = if job_token.is_cancelled() {
                    Outcome::Canceled
                } else {
                    match catch_unwind(AssertUnwindSafe(f)) {
                        Ok(value) => Outcome::Value(value),
                        Err(payload) => Outcome::Panicked(payload),
                    }
                };
                let _ = tx.send(outcome);
            }));
            if !enqueued {
                return Err(Error::from(ErrorKind::Stopped));
            }

            match rx.recv_async().await {
                Ok(Outcome::Value(value)) => Ok(value),
                Ok(Outcome::Canceled) => Err(Error::from(ErrorKind::Canceled)),
                Ok(Outcome::Panicked(payload)) => std::panic::resume_unwind(payload),
                // Worker dropped the job without running it.
                Err(_) => Err(Error::from(ErrorKind::Closed)),
            }
        })
    }

    fn try_enqueue(&self, job: Job) -> bool {
        {
            let mut state = self.state.lock().expect("pool lock poisoned");
            if state.stop {
                return false;
            }
            state.jobs.push_back(job);
        }
        self.cv.notify_one();
        true
    }

    fn request_stop(&self) {
        {
            let mut state = self.state.lock().expect("pool lock poisoned");
            state.stop = true;
        }
        self.cv.notify_all();
    }

    fn worker_loop(&self) {
        tracing::trace!("pool worker {:?} started", thread::current().name());
        loop {
            let job = {
                let mut state = self.state.lock().expect("pool lock poisoned");
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        break Some(job);
                    }
                    if state.stop {
                        break None;
                    }
                    state = self.cv.wait(state).expect("pool lock poisoned");
                }
            };

            match job {
                Some(job) => {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("pool job panicked");
                    }
                }
                None => break,
            }
        }
        tracing::trace!("pool worker {:?} exited", thread::current().name());
    }
}
