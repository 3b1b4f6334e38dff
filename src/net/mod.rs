//! Reactor embedding: a mio poll loop on a dedicated net thread, plus
//! the readiness plumbing socket operations await on.

mod dns;
mod tcp;
mod udp;

pub use dns::{DnsResolver, ResolvedAddr};
pub use tcp::{Endpoint, TcpListener, TcpStream};
pub use udp::{Datagram, UdpSocket};

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread::JoinHandle;

use mio::event::Source;
use mio::{Events, Interest, Poll as MioPoll, Registry, Token};
use slab::Slab;

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};

const WAKE_TOKEN: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 256;

/// Hosts the reactor: a `mio::Poll` driven on its own net thread.
///
/// Sockets register once with combined read/write interest; the net
/// thread flips per-direction readiness slots and wakes whichever task
/// was waiting, which re-posts it onto the loop scheduler. The blocking
/// poll keeps the thread alive while the service exists; `stop` wakes it
/// so it can observe the flag.
pub struct NetService {
    shared: Arc<NetShared>,
    thread: Option<JoinHandle<()>>,
}

pub(crate) struct NetShared {
    registry: Registry,
    sources: Mutex<Slab<Arc<IoSource>>>,
    waker: mio::Waker,
    stopped: AtomicBool,
}

pub(crate) struct IoSource {
    read: DirSlot,
    write: DirSlot,
}

#[derive(Default)]
struct DirSlot {
    state: Mutex<DirState>,
}

#[derive(Default)]
struct DirState {
    ready: bool,
    waker: Option<Waker>,
}

impl DirSlot {
    fn wake_ready(&self) {
        let waker = {
            let mut state = self.state.lock().expect("net slot lock poisoned");
            state.ready = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Await readiness once, consuming the flag.
    fn ready(&self) -> Readiness<'_> {
        Readiness { slot: self }
    }
}

struct Readiness<'a> {
    slot: &'a DirSlot,
}

impl Future for Readiness<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.slot.state.lock().expect("net slot lock poisoned");
        if state.ready {
            state.ready = false;
            Poll::Ready(())
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl NetService {
    /// Build the reactor and start the net thread.
    pub(crate) fn new() -> Self {
        let poll = MioPoll::new().expect("unable to create reactor poll");
        let registry = poll
            .registry()
            .try_clone()
            .expect("unable to clone reactor registry");
        let waker =
            mio::Waker::new(poll.registry(), WAKE_TOKEN).expect("unable to create reactor waker");

        let shared = Arc::new(NetShared {
            registry,
            sources: Mutex::new(Slab::new()),
            waker,
            stopped: AtomicBool::new(false),
        });

        let thread = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("unilio-net".into())
                .spawn(move || driver_loop(poll, shared))
                .expect("unable to spawn net thread")
        };

        Self {
            shared,
            thread: Some(thread),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<NetShared> {
        &self.shared
    }

    /// Ask the net thread to exit; it is joined when the service drops.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        if let Err(e) = self.shared.waker.wake() {
            tracing::error!("reactor wake failed: {e}");
        }
    }
}

impl Drop for NetService {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn driver_loop(mut poll: MioPoll, shared: Arc<NetShared>) {
    tracing::debug!("net thread started");
    let mut events = Events::with_capacity(EVENT_CAPACITY);

    loop {
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!("reactor poll failed: {e}");
            break;
        }

        for event in events.iter() {
            if event.token() == WAKE_TOKEN {
                continue;
            }

            let source = {
                let sources = shared.sources.lock().expect("net sources lock poisoned");
                sources.get(event.token().0).cloned()
            };

            if let Some(source) = source {
                if event.is_readable() || event.is_read_closed() || event.is_error() {
                    source.read.wake_ready();
                }
                if event.is_writable() || event.is_write_closed() || event.is_error() {
                    source.write.wake_ready();
                }
            }
        }
    }
    tracing::debug!("net thread exited");
}

impl NetShared {
    fn attach(&self, io: &mut impl Source) -> io::Result<(usize, Arc<IoSource>)> {
        let mut sources = self.sources.lock().expect("net sources lock poisoned");
        let entry = sources.vacant_entry();
        let token = entry.key();
        self.registry.register(
            io,
            Token(token),
            Interest::READABLE.add(Interest::WRITABLE),
        )?;
        let source = Arc::new(IoSource {
            read: DirSlot::default(),
            write: DirSlot::default(),
        });
        entry.insert(source.clone());
        Ok((token, source))
    }

    fn detach(&self, token: usize, io: &mut impl Source) {
        if let Err(e) = self.registry.deregister(io) {
            tracing::trace!("deregister failed: {e}");
        }
        let mut sources = self.sources.lock().expect("net sources lock poisoned");
        if sources.contains(token) {
            sources.remove(token);
        }
    }
}

/// Direction a socket operation suspends on.
#[derive(Clone, Copy)]
pub(crate) enum Dir {
    Read,
    Write,
}

/// A registered mio source plus the state its async operations loop on.
pub(crate) struct Async<T: Source> {
    io: Option<T>,
    token: usize,
    source: Arc<IoSource>,
    shared: Arc<NetShared>,
}

impl<T: Source> Async<T> {
    pub(crate) fn new(shared: Arc<NetShared>, mut io: T) -> io::Result<Self> {
        let (token, source) = shared.attach(&mut io)?;
        Ok(Self {
            io: Some(io),
            token,
            source,
            shared,
        })
    }

    pub(crate) fn shared(&self) -> &Arc<NetShared> {
        &self.shared
    }

    pub(crate) fn get(&self) -> Result<&T, Error> {
        self.io.as_ref().ok_or(Error::Kind(ErrorKind::Closed))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.io.is_some()
    }

    /// Deregister and drop the socket. Idempotent.
    pub(crate) fn close(&mut self) {
        if let Some(mut io) = self.io.take() {
            self.shared.detach(self.token, &mut io);
        }
    }

    /// Wait until the socket reports writable. Used by connect, which has
    /// no syscall to retry.
    pub(crate) async fn writable(&self) {
        self.source.write.ready().await;
    }

    /// Attempt `op` until it stops returning `WouldBlock`, suspending on
    /// `dir` readiness between attempts. The token is re-checked at every
    /// retry boundary.
    pub(crate) async fn io_with<R>(
        &mut self,
        dir: Dir,
        token: &CancelToken,
        mut op: impl FnMut(&mut T) -> io::Result<R>,
    ) -> Result<R, Error> {
        let source = self.source.clone();
        loop {
            if token.is_cancelled() {
                return Err(Error::from(ErrorKind::Canceled));
            }

            let io = self.io.as_mut().ok_or(Error::Kind(ErrorKind::Closed))?;
            match op(io) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(Error::from),
            }

            match dir {
                Dir::Read => source.read.ready().await,
                Dir::Write => source.write.ready().await,
            }
        }
    }
}

impl<T: Source> Drop for Async<T> {
    fn drop(&mut self) {
        self.close();
    }
}
