//! UDP socket over the reactor.

use mio::net::UdpSocket as MioUdpSocket;

use crate::cancel::CancelToken;
use crate::error::Error;

use super::{Async, Dir, Endpoint, NetService};

/// Metadata for one received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub from: Endpoint,
    pub bytes: usize,
}

/// Bound UDP socket.
pub struct UdpSocket {
    inner: Async<MioUdpSocket>,
}

impl UdpSocket {
    /// Bind a socket to `ep`.
    pub fn bind(net: &NetService, ep: &Endpoint) -> Result<UdpSocket, Error> {
        let addr = ep.socket_addr()?;
        let socket = MioUdpSocket::bind(addr)?;
        Ok(UdpSocket {
            inner: Async::new(net.shared().clone(), socket)?,
        })
    }

    /// Send one datagram to `target`, returning the bytes sent.
    pub async fn send_to(
        &mut self,
        buf: &[u8],
        target: &Endpoint,
        token: &CancelToken,
    ) -> Result<usize, Error> {
        let addr = target.socket_addr()?;
        self.inner
            .io_with(Dir::Write, token, |io| io.send_to(buf, addr))
            .await
    }

    /// Receive one datagram into `buf`.
    pub async fn recv_from(
        &mut self,
        buf: &mut [u8],
        token: &CancelToken,
    ) -> Result<Datagram, Error> {
        let (bytes, from) = self
            .inner
            .io_with(Dir::Read, token, |io| io.recv_from(buf))
            .await?;
        Ok(Datagram {
            from: from.into(),
            bytes,
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
