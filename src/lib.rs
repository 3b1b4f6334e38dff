//! unilio is a single-threaded cooperative async runtime: all user
//! futures execute on one event-loop thread, while CPU-bound closures,
//! timers, OS signals and socket readiness are produced on auxiliary
//! threads and marshaled back onto the loop through the scheduler.
//!
//! The entry point is [`IoContext`]: it owns the scheduler and lazily
//! builds the CPU pool, timer service, signal bridge and net service on
//! first use. Work is expressed as [`Task`] values, which run no user
//! code until awaited or handed to the scheduler with [`spawn_detached`].

mod cancel;
mod context;
mod error;
pub mod net;
mod pool;
mod scheduler;
mod signal;
mod spawn;
mod task;
mod timer;

pub use cancel::{CancelSource, CancelToken};
pub use context::IoContext;
pub use error::{Error, ErrorKind, Result};
pub use pool::ThreadPool;
pub use scheduler::{yield_now, Scheduler, YieldNow};
pub use signal::SignalSet;
pub use spawn::spawn_detached;
pub use task::Task;
pub use timer::TimerService;
