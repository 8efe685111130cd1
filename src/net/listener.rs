//! TLS listener binding and the handle that owns the bound socket.
//!
//! # Responsibilities
//! - Bind the configured address with the configured TLS material
//! - Classify bind failures (busy race vs. fatal)
//! - Serve the request pipeline once bound
//! - Close exactly once, whether or not serving ever started
//!
//! # Design Decisions
//! - The socket is bound eagerly so bind errors surface during startup,
//!   not later inside the server task
//! - Closing is idempotent; the second and later calls return immediately

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::watch;

use crate::net::probe::new_socket;
use crate::net::tls::{TlsError, TlsMaterial};

/// Backlog for the real listener.
const LISTEN_BACKLOG: u32 = 1024;

/// A bound server socket.
pub trait ListenerHandle: Send + Sync + 'static {
    /// Address the socket is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Whether the socket is still open.
    fn is_open(&self) -> bool;

    /// Close the socket and wait until it has stopped serving.
    ///
    /// Closing an already closed handle is a no-op.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Error type for bind operations.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Another socket holds the address.
    #[error("address {0} already in use")]
    AddrInUse(SocketAddr),

    /// Certificate or key material is unusable.
    #[error("invalid TLS material: {0}")]
    Tls(#[from] TlsError),

    /// Any other OS-level bind failure.
    #[error("failed to bind {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    /// Classify an OS error raised while binding `addr`.
    pub fn from_io(addr: SocketAddr, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AddrInUse {
            BindError::AddrInUse(addr)
        } else {
            BindError::Io { addr, source }
        }
    }

    /// True for the retryable busy case.
    pub fn is_addr_in_use(&self) -> bool {
        matches!(self, BindError::AddrInUse(_))
    }
}

/// Creates bound listeners.
pub trait ListenerBinder: Send + Sync {
    type Handle: ListenerHandle;

    fn bind(&self, addr: SocketAddr) -> impl Future<Output = Result<Self::Handle, BindError>> + Send;
}

/// Binds TCP sockets and wraps them in TLS.
#[derive(Debug, Clone)]
pub struct TlsBinder {
    material: TlsMaterial,
    drain_timeout: Duration,
}

impl TlsBinder {
    /// `drain_timeout` bounds how long in-flight connections may finish after close.
    pub fn new(material: TlsMaterial, drain_timeout: Duration) -> Self {
        Self {
            material,
            drain_timeout,
        }
    }
}

impl ListenerBinder for TlsBinder {
    type Handle = TlsListener;

    async fn bind(&self, addr: SocketAddr) -> Result<TlsListener, BindError> {
        // Parse TLS first so bad material never occupies the port.
        let tls = self.material.to_rustls_config().await?;

        let socket = new_socket(addr).map_err(|e| BindError::from_io(addr, e))?;
        socket.bind(addr).map_err(|e| BindError::from_io(addr, e))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| BindError::from_io(addr, e))?;

        let local_addr = listener.local_addr().map_err(|e| BindError::from_io(addr, e))?;
        let std_listener = listener.into_std().map_err(|e| BindError::from_io(addr, e))?;

        tracing::info!(address = %local_addr, "TLS listener bound");

        Ok(TlsListener::new(local_addr, std_listener, tls, self.drain_timeout))
    }
}

/// Lifecycle of a [`TlsListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Socket bound, not yet serving.
    Bound,
    /// Accepting connections.
    Serving,
    /// Closed; never reopened.
    Closed,
}

/// A bound TLS socket plus the server that will accept on it.
pub struct TlsListener {
    local_addr: SocketAddr,
    pending: Mutex<Option<(std::net::TcpListener, RustlsConfig)>>,
    server: axum_server::Handle,
    state: watch::Sender<ListenerState>,
    stopped: watch::Sender<bool>,
    drain_timeout: Duration,
}

impl TlsListener {
    fn new(
        local_addr: SocketAddr,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            local_addr,
            pending: Mutex::new(Some((listener, tls))),
            server: axum_server::Handle::new(),
            state: watch::Sender::new(ListenerState::Bound),
            stopped: watch::Sender::new(false),
            drain_timeout,
        }
    }

    fn take_pending(&self) -> Option<(std::net::TcpListener, RustlsConfig)> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Accept TLS connections and dispatch them to `app` until closed.
    ///
    /// Returns an error if the listener was already served.
    pub async fn serve(&self, app: Router) -> io::Result<()> {
        let Some((listener, tls)) = self.take_pending() else {
            return Err(io::Error::other("listener already served or closed"));
        };

        let started = self.state.send_if_modified(|state| {
            if *state == ListenerState::Bound {
                *state = ListenerState::Serving;
                true
            } else {
                false
            }
        });
        if !started {
            tracing::debug!(address = %self.local_addr, "Listener closed before serving");
            return Ok(());
        }

        tracing::info!(address = %self.local_addr, "Secure server accepting connections");

        let result = axum_server::from_tcp_rustls(listener, tls)
            .handle(self.server.clone())
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await;

        self.stopped.send_replace(true);
        tracing::info!(address = %self.local_addr, "Secure server stopped");
        result
    }
}

impl fmt::Debug for TlsListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsListener")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ListenerHandle for TlsListener {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn is_open(&self) -> bool {
        self.state() != ListenerState::Closed
    }

    async fn close(&self) {
        match self.state.send_replace(ListenerState::Closed) {
            ListenerState::Closed => {}
            ListenerState::Bound => {
                drop(self.take_pending());
                self.stopped.send_replace(true);
                tracing::info!(address = %self.local_addr, "Listener closed before serving");
            }
            ListenerState::Serving => {
                let mut stopped = self.stopped.subscribe();
                self.server.graceful_shutdown(Some(self.drain_timeout));
                let _ = stopped.wait_for(|done| *done).await;
                tracing::info!(address = %self.local_addr, "Listener closed");
            }
        }
    }
}
