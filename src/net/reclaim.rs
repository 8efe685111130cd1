//! Best-effort port reclamation before a bind attempt.
//!
//! Either closes a listener this process still owns, or binds and drops a
//! throwaway socket on the target address to shake loose stale OS state.
//! Nothing here can fail the startup sequence; every problem is logged and
//! swallowed. A fixed settle delay follows so the OS can finish tearing the
//! socket down before the next probe.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::net::listener::ListenerHandle;
use crate::net::probe::bind_throwaway;
use crate::resilience::Sleeper;

/// Frees a port ahead of probing it.
pub trait PortReclaimer<H: ListenerHandle>: Send + Sync {
    /// Never fails; `owned` is the listener this process currently holds, if any.
    fn reclaim(&self, addr: SocketAddr, owned: Option<Arc<H>>) -> impl Future<Output = ()> + Send;
}

/// Reclaimer working on real sockets.
#[derive(Debug, Clone)]
pub struct SocketReclaimer<S> {
    settle_delay: Duration,
    close_timeout: Duration,
    sleeper: S,
}

impl<S: Sleeper> SocketReclaimer<S> {
    pub fn new(settle_delay: Duration, close_timeout: Duration, sleeper: S) -> Self {
        Self {
            settle_delay,
            close_timeout,
            sleeper,
        }
    }
}

impl<H: ListenerHandle, S: Sleeper> PortReclaimer<H> for SocketReclaimer<S> {
    async fn reclaim(&self, addr: SocketAddr, owned: Option<Arc<H>>) {
        match owned {
            Some(handle) => {
                tracing::info!(%addr, "Closing listener from previous start");
                if tokio::time::timeout(self.close_timeout, handle.close()).await.is_err() {
                    tracing::warn!(
                        %addr,
                        timeout_ms = self.close_timeout.as_millis() as u64,
                        "Close of previous listener timed out, continuing"
                    );
                }
            }
            None => match bind_throwaway(addr) {
                Ok(listener) => {
                    drop(listener);
                    tracing::debug!(%addr, "Throwaway bind released");
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "Throwaway bind failed, ignoring");
                }
            },
        }

        self.sleeper.sleep(self.settle_delay).await;
    }
}
