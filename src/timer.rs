//! Deadline service: one thread parked until the nearest deadline,
//! completing sleeps through one-shot channels.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct TimerEntry {
    deadline: Instant,
    id: u64,
    tx: flume::Sender<()>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; reverse so the soonest deadline is on
        // top.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    cv: Condvar,
}

struct TimerState {
    heap: BinaryHeap<TimerEntry>,
    next_id: u64,
    stop: bool,
}

/// Completes time-based wakeups from a dedicated timer thread.
///
/// Firing an entry sends on its one-shot channel; the sleeping future's
/// waker then re-posts the task onto the loop scheduler, so resumption
/// happens on the loop thread.
pub struct TimerService {
    shared: Arc<TimerShared>,
    thread: Option<JoinHandle<()>>,
}

impl TimerService {
    pub(crate) fn new() -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_id: 0,
                stop: false,
            }),
            cv: Condvar::new(),
        });

        let thread = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("unilio-timer".into())
                .spawn(move || shared.timer_loop())
                .expect("unable to spawn timer thread")
        };

        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// Complete after `duration`.
    ///
    /// Lazy: the deadline is registered when the future is first polled.
    /// Outstanding sleeps complete immediately when the service stops.
    pub fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send + 'static {
        let shared = self.shared.clone();
        async move {
            let rx = shared.register(Instant::now() + duration);
            let _ = rx.recv_async().await;
        }
    }

    /// Ask the timer thread to exit, completing all outstanding sleeps.
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shared.request_stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl TimerShared {
    fn register(&self, deadline: Instant) -> flume::Receiver<()> {
        let (tx, rx) = flume::bounded(1);
        {
            let mut state = self.state.lock().expect("timer lock poisoned");
            if state.stop {
                // Dropping the sender completes the sleep immediately.
                return rx;
            }
            let id = state.next_id;
            state.next_id += 1;
            state.heap.push(TimerEntry { deadline, id, tx });
        }
        self.cv.notify_one();
        rx
    }

    fn request_stop(&self) {
        {
            let mut state = self.state.lock().expect("timer lock poisoned");
            state.stop = true;
            // Dropping the queued senders completes outstanding sleeps.
            state.heap.clear();
        }
        self.cv.notify_all();
    }

    fn timer_loop(&self) {
        tracing::trace!("timer thread started");
        let mut state = self.state.lock().expect("timer lock poisoned");
        loop {
            if state.stop {
                break;
            }

            let now = Instant::now();
            while state.heap.peek().map(|e| e.deadline <= now).unwrap_or(false) {
                if let Some(entry) = state.heap.pop() {
                    let _ = entry.tx.send(());
                }
            }

            match state.heap.peek().map(|e| e.deadline) {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    let (guard, _) = self
                        .cv
                        .wait_timeout(state, wait)
                        .expect("timer lock poisoned");
                    state = guard;
                }
                None => {
                    state = self.cv.wait(state).expect("timer lock poisoned");
                }
            }
        }
        tracing::trace!("timer thread exited");
    }
}
