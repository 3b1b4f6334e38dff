//! User-owned runtime context tying the scheduler to its lazily-built
//! subsystems.

use std::sync::{Arc, OnceLock};

use crate::net::NetService;
use crate::pool::ThreadPool;
use crate::scheduler::Scheduler;
use crate::signal::SignalSet;
use crate::timer::TimerService;

/// Cloneable handle to one runtime instance.
///
/// The context owns the loop scheduler plus, once first used, the CPU
/// pool, timer service, signal bridge and net service. Clones share one
/// runtime; dropping the last clone stops and joins every subsystem
/// thread before the scheduler goes away.
#[derive(Clone)]
pub struct IoContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    sched: Arc<Scheduler>,
    cpu_pool: OnceLock<ThreadPool>,
    timers: OnceLock<TimerService>,
    signals: OnceLock<SignalSet>,
    net: OnceLock<NetService>,
}

impl IoContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                sched: Arc::new(Scheduler::new()),
                cpu_pool: OnceLock::new(),
                timers: OnceLock::new(),
                signals: OnceLock::new(),
                net: OnceLock::new(),
            }),
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.inner.sched
    }

    /// Enqueue a job on the loop scheduler.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.sched.post(job);
    }

    /// Run the loop on the calling thread; see [`Scheduler::run`].
    pub fn run(&self) {
        self.inner.sched.run();
    }

    pub fn stop(&self) {
        self.inner.sched.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.sched.is_running()
    }

    /// CPU pool for blocking or compute-bound closures. Built on first
    /// access with one worker per available core.
    pub fn cpu_pool(&self) -> &ThreadPool {
        self.inner.cpu_pool.get_or_init(ThreadPool::with_default_size)
    }

    /// Timer service. Built on first access.
    pub fn timers(&self) -> &TimerService {
        self.inner.timers.get_or_init(TimerService::new)
    }

    /// Signal bridge. Built on first access.
    pub fn signals(&self) -> &SignalSet {
        self.inner
            .signals
            .get_or_init(|| SignalSet::new(&self.inner.sched))
    }

    /// Net service hosting the reactor thread. Built on first access.
    pub fn net(&self) -> &NetService {
        self.inner.net.get_or_init(NetService::new)
    }
}

impl Default for IoContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // Teardown order: pool, signals, net, timers; the scheduler then
        // falls out of scope last.
        drop(self.cpu_pool.take());
        drop(self.signals.take());
        drop(self.net.take());
        drop(self.timers.take());
    }
}
