//! OS signal bridge: a capture thread synchronously waits on the
//! observed set and marshals captured signals onto the loop scheduler.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};
use crate::scheduler::Scheduler;
use crate::task::Task;

type SignalCallback = Arc<dyn Fn(i32) + Send + Sync>;

struct SignalShared {
    sched: Weak<Scheduler>,
    state: Mutex<SignalState>,
}

#[derive(Default)]
struct SignalState {
    signals: Vec<i32>,
    pending: VecDeque<i32>,
    callback: Option<SignalCallback>,
    waiter: Option<flume::Sender<i32>>,
    stop: bool,
}

/// Watches a set of OS signals from a dedicated capture thread.
///
/// Captured signals are posted onto the loop scheduler, where the
/// registered callback (if any) runs first, then a suspended
/// [`async_wait`](SignalSet::async_wait) is resumed; with no waiter the
/// signal queues until consumed. Supported on Linux; every operation
/// reports [`ErrorKind::NotSupported`] elsewhere.
pub struct SignalSet {
    shared: Arc<SignalShared>,
    thread: OnceLock<JoinHandle<()>>,
}

impl SignalSet {
    pub(crate) fn new(sched: &Arc<Scheduler>) -> Self {
        Self {
            shared: Arc::new(SignalShared {
                sched: Arc::downgrade(sched),
                state: Mutex::new(SignalState::default()),
            }),
            thread: OnceLock::new(),
        }
    }

    /// Observe `sig`.
    ///
    /// Starts the capture thread on first use; a dynamic add takes effect
    /// at the next capture iteration. The signal is also blocked on the
    /// calling thread so default delivery cannot fire there; threads
    /// spawned afterwards inherit the mask.
    #[tracing::instrument(skip(self))]
    pub fn add(&self, sig: i32) -> Result<(), Error> {
        sys::ensure_supported()?;
        sys::block_on_current_thread(sig);
        {
            let mut state = self.shared.state.lock().expect("signal lock poisoned");
            if !state.signals.contains(&sig) {
                state.signals.push(sig);
            }
        }
        self.start_if_needed();
        Ok(())
    }

    /// Stop observing `sig` at the next capture iteration.
    pub fn remove(&self, sig: i32) -> Result<(), Error> {
        sys::ensure_supported()?;
        let mut state = self.shared.state.lock().expect("signal lock poisoned");
        state.signals.retain(|s| *s != sig);
        Ok(())
    }

    /// Wait for the next captured signal.
    ///
    /// Completes immediately with the head of the pending queue when one
    /// is queued. At most one waiter may be suspended at a time; a second
    /// concurrent wait is a caller bug and is rejected by assertion.
    /// Cancellation is checked on entry.
    pub fn async_wait(&self, token: CancelToken) -> Task<Result<i32, Error>> {
        let shared = self.shared.clone();
        Task::new(async move {
            sys::ensure_supported()?;
            if token.is_cancelled() {
                return Err(Error::from(ErrorKind::Canceled));
            }

            let rx = {
                let mut state = shared.state.lock().expect("signal lock poisoned");
                if let Some(sig) = state.pending.pop_front() {
                    return Ok(sig);
                }
                if state.stop {
                    return Err(Error::from(ErrorKind::Canceled));
                }
                assert!(
                    state.waiter.is_none(),
                    "signal bridge supports a single concurrent waiter"
                );
                let (tx, rx) = flume::bounded(1);
                state.waiter = Some(tx);
                rx
            };

            match rx.recv_async().await {
                Ok(sig) => Ok(sig),
                // The bridge stopped while we were suspended.
                Err(_) => Err(Error::from(ErrorKind::Canceled)),
            }
        })
    }

    /// Invoke `f` on the loop thread once per captured signal, before any
    /// waiter is resumed.
    pub fn on_signal<F>(&self, f: F) -> Result<(), Error>
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        sys::ensure_supported()?;
        let mut state = self.shared.state.lock().expect("signal lock poisoned");
        state.callback = Some(Arc::new(f));
        Ok(())
    }

    /// Ask the capture thread to exit and unblock a suspended waiter with
    /// a canceled completion.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock().expect("signal lock poisoned");
        state.stop = true;
        // Dropping the sender cancels the waiter.
        state.waiter.take();
    }

    fn start_if_needed(&self) {
        self.thread.get_or_init(|| {
            let shared = self.shared.clone();
            std::thread::Builder::new()
                .name("unilio-signals".into())
                .spawn(move || sys::capture_loop(shared))
                .expect("unable to spawn signal capture thread")
        });
    }
}

impl Drop for SignalSet {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl SignalShared {
    /// Runs on the loop thread, once per captured signal.
    fn dispatch(&self, sig: i32) {
        let (callback, waiter) = {
            let mut state = self.state.lock().expect("signal lock poisoned");
            let callback = state.callback.clone();
            let waiter = state.waiter.take();
            if waiter.is_none() {
                state.pending.push_back(sig);
            }
            (callback, waiter)
        };

        if let Some(callback) = callback {
            callback(sig);
        }
        if let Some(waiter) = waiter {
            let _ = waiter.send(sig);
        }
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::sync::Arc;

    use super::SignalShared;
    use crate::error::Error;

    pub(super) fn ensure_supported() -> Result<(), Error> {
        Ok(())
    }

    pub(super) fn block_on_current_thread(sig: i32) {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, sig);
            libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        }
    }

    pub(super) fn capture_loop(shared: Arc<SignalShared>) {
        tracing::debug!("signal capture thread started");
        loop {
            let signals = {
                let state = shared.state.lock().expect("signal lock poisoned");
                if state.stop {
                    break;
                }
                state.signals.clone()
            };

            if let Some(sig) = wait_one(&signals) {
                tracing::trace!("captured signal {sig}");
                if let Some(sched) = shared.sched.upgrade() {
                    let shared = shared.clone();
                    sched.post(move || shared.dispatch(sig));
                } else {
                    break;
                }
            }
            // On timeout, loop around to re-read the set and stop flag.
        }
        tracing::debug!("signal capture thread exited");
    }

    /// Block `signals` on this thread and wait up to 200 ms for one of
    /// them to arrive.
    fn wait_one(signals: &[i32]) -> Option<i32> {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            for sig in signals {
                libc::sigaddset(&mut set, *sig);
            }
            libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());

            let timeout = libc::timespec {
                tv_sec: 0,
                tv_nsec: 200_000_000,
            };
            let mut info: libc::siginfo_t = std::mem::zeroed();
            let sig = libc::sigtimedwait(&set, &mut info, &timeout);
            // EAGAIN on timeout, EINTR on interruption.
            if sig > 0 {
                Some(sig)
            } else {
                None
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::sync::Arc;

    use super::SignalShared;
    use crate::error::{Error, ErrorKind};

    pub(super) fn ensure_supported() -> Result<(), Error> {
        Err(Error::from(ErrorKind::NotSupported))
    }

    pub(super) fn block_on_current_thread(_sig: i32) {}

    pub(super) fn capture_loop(_shared: Arc<SignalShared>) {}
}
