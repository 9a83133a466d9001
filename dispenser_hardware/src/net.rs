//! Host network stack adapters: non-blocking UDP and a thread-backed resolver.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use dispenser_traits::{BoxError, DatagramSocket, ResolveCallback, Resolver};
use tracing::debug;

use crate::error::{HwError, Result};

pub struct UdpDatagram {
    socket: UdpSocket,
}

impl UdpDatagram {
    /// Bind an ephemeral local port and switch the socket to non-blocking.
    pub fn bind_any() -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_nonblocking(true)?;
        debug!(local = ?socket.local_addr().ok(), "udp socket bound");
        Ok(Self { socket })
    }
}

impl DatagramSocket for UdpDatagram {
    fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> std::result::Result<(), BoxError> {
        self.socket.send_to(payload, addr).map_err(HwError::from)?;
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> std::result::Result<Option<usize>, BoxError> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }
}

/// Resolves on a short-lived thread and reports through the callback.
///
/// Only IPv4 results are usable since `UdpDatagram` binds `0.0.0.0`; a host
/// with no IPv4 address is reported as a failed lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadResolver;

fn first_ipv4(host: &str, addrs: impl IntoIterator<Item = SocketAddr>) -> Result<SocketAddr> {
    addrs.into_iter().find(SocketAddr::is_ipv4).ok_or_else(|| {
        HwError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("no IPv4 address for {host}"),
        ))
    })
}

impl Resolver for ThreadResolver {
    fn resolve(&mut self, host: &str, port: u16, on_done: ResolveCallback) {
        let host = host.to_string();
        std::thread::spawn(move || {
            let result = (host.as_str(), port)
                .to_socket_addrs()
                .map_err(HwError::from)
                .and_then(|addrs| first_ipv4(&host, addrs))
                .map_err(|e| -> BoxError { Box::new(e) });
            on_done(result);
        });
    }
}
