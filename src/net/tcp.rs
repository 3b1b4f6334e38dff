//! TCP stream and listener over the reactor.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::fd::AsRawFd;

use mio::net::{TcpListener as MioTcpListener, TcpStream as MioTcpStream};

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};

use super::{Async, Dir, NetService};

/// Network endpoint: host and port. The host must be an IP literal for
/// direct socket operations; names go through [`DnsResolver`] first.
///
/// [`DnsResolver`]: super::DnsResolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub(crate) fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let ip = self.host.parse().map_err(|_| {
            Error::with_message(
                ErrorKind::InvalidArgument,
                format!("not an IP literal: {}", self.host),
            )
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// Connected TCP socket.
pub struct TcpStream {
    inner: Async<MioTcpStream>,
}

impl std::fmt::Debug for TcpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpStream").finish_non_exhaustive()
    }
}

impl TcpStream {
    /// Open a connection to `ep`.
    pub async fn connect(
        net: &NetService,
        ep: &Endpoint,
        token: CancelToken,
    ) -> Result<TcpStream, Error> {
        if token.is_cancelled() {
            return Err(Error::from(ErrorKind::Canceled));
        }

        let addr = ep.socket_addr()?;
        let stream = MioTcpStream::connect(addr)?;
        let mut stream = TcpStream {
            inner: Async::new(net.shared().clone(), stream)?,
        };
        stream.finish_connect(&token).await?;
        Ok(stream)
    }

    /// A non-blocking connect completes on writability; a connection
    /// error is reported through `take_error`, and a socket that is
    /// writable but not yet connected is waited on again.
    async fn finish_connect(&mut self, token: &CancelToken) -> Result<(), Error> {
        loop {
            if token.is_cancelled() {
                return Err(Error::from(ErrorKind::Canceled));
            }
            self.inner.writable().await;

            let io = self.inner.get()?;
            if let Some(e) = io.take_error()? {
                return Err(Error::from(e));
            }
            match io.peer_addr() {
                Ok(_) => return Ok(()),
                Err(e)
                    if e.kind() == io::ErrorKind::NotConnected
                        || e.raw_os_error() == Some(libc::EINPROGRESS) => {}
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    pub async fn read(&mut self, buf: &mut [u8], token: &CancelToken) -> Result<usize, Error> {
        self.inner.io_with(Dir::Read, token, |io| io.read(buf)).await
    }

    /// Write from `buf`, returning the number of bytes accepted.
    pub async fn write(&mut self, buf: &[u8], token: &CancelToken) -> Result<usize, Error> {
        self.inner
            .io_with(Dir::Write, token, |io| io.write(buf))
            .await
    }

    pub fn local_addr(&self) -> Result<Endpoint, Error> {
        Ok(self.inner.get()?.local_addr()?.into())
    }

    pub fn peer_addr(&self) -> Result<Endpoint, Error> {
        Ok(self.inner.get()?.peer_addr()?.into())
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

/// Listening TCP socket producing [`TcpStream`]s.
pub struct TcpListener {
    inner: Async<MioTcpListener>,
}

impl std::fmt::Debug for TcpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpListener").finish_non_exhaustive()
    }
}

impl TcpListener {
    /// Bind `ep` and start listening with the given backlog.
    pub fn listen(net: &NetService, ep: &Endpoint, backlog: i32) -> Result<TcpListener, Error> {
        let addr = ep.socket_addr()?;
        let listener = MioTcpListener::bind(addr)?;
        // mio binds with its own default backlog; re-listen to apply the
        // requested one.
        unsafe {
            if libc::listen(listener.as_raw_fd(), backlog) != 0 {
                return Err(Error::from(io::Error::last_os_error()));
            }
        }
        Ok(TcpListener {
            inner: Async::new(net.shared().clone(), listener)?,
        })
    }

    /// Accept the next incoming connection.
    pub async fn accept(&mut self, token: &CancelToken) -> Result<TcpStream, Error> {
        let shared = self.inner.shared().clone();
        let (stream, peer) = self
            .inner
            .io_with(Dir::Read, token, |io| io.accept())
            .await?;
        tracing::trace!("accepted connection from {peer}");
        Ok(TcpStream {
            inner: Async::new(shared, stream)?,
        })
    }

    pub fn local_addr(&self) -> Result<Endpoint, Error> {
        Ok(self.inner.get()?.local_addr()?.into())
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}
