//! Name resolution offloaded to the CPU pool.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::context::IoContext;
use crate::error::Error;
use crate::pool::PoolShared;
use crate::task::Task;

/// One resolved endpoint: textual IP plus port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddr {
    pub ip: String,
    pub port: u16,
}

/// Resolves host names with the platform resolver, run on the CPU pool
/// so the blocking lookup never touches the loop thread.
pub struct DnsResolver {
    pool: Arc<PoolShared>,
}

impl DnsResolver {
    pub fn new(ctx: &IoContext) -> Self {
        Self {
            pool: ctx.cpu_pool().shared().clone(),
        }
    }

    /// Resolve `host:port` into all matching addresses.
    pub fn resolve(
        &self,
        host: impl Into<String>,
        port: u16,
        token: CancelToken,
    ) -> Task<Result<Vec<ResolvedAddr>, Error>> {
        let host = host.into();
        let lookup = self.pool.clone().submit(
            move || {
                (host.as_str(), port).to_socket_addrs().map(|addrs| {
                    addrs
                        .map(|addr| ResolvedAddr {
                            ip: addr.ip().to_string(),
                            port: addr.port(),
                        })
                        .collect::<Vec<_>>()
                })
            },
            token,
        );
        Task::new(async move { lookup.await?.map_err(Error::from) })
    }
}
