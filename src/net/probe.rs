//! Port availability probing.
//!
//! # Responsibilities
//! - Decide whether an address can be bound right now
//! - Tell "port busy" apart from every other bind failure
//!
//! # Design Decisions
//! - The probe binds a throwaway listener and drops it before returning
//! - Busy is a value (`Ok(false)`), anything else is an error the caller must treat as fatal

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

/// A bind failure that is not "address in use".
#[derive(Debug, thiserror::Error)]
#[error("probe of {addr} failed: {source}")]
pub struct ProbeError {
    pub addr: SocketAddr,
    #[source]
    pub source: io::Error,
}

/// Determines whether a TCP address is currently bindable.
pub trait PortProbe: Send + Sync {
    /// `Ok(true)` when free, `Ok(false)` when another socket holds it.
    fn is_port_free(&self, addr: SocketAddr) -> impl Future<Output = Result<bool, ProbeError>> + Send;
}

/// Probe that performs a real bind-and-release on the local host.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    async fn is_port_free(&self, addr: SocketAddr) -> Result<bool, ProbeError> {
        match bind_throwaway(addr) {
            Ok(listener) => {
                drop(listener);
                tracing::trace!(%addr, "Probe bind succeeded");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(false),
            Err(source) => Err(ProbeError { addr, source }),
        }
    }
}

/// Create a TCP socket for `addr` with the options every listener in this crate uses.
pub(crate) fn new_socket(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // Lets a restarted process bind over TIME_WAIT remnants; a live listener still yields EADDRINUSE.
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    Ok(socket)
}

/// Bind and listen on `addr`; the caller decides how long to keep it.
pub(crate) fn bind_throwaway(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = new_socket(addr)?;
    socket.bind(addr)?;
    socket.listen(1)
}
