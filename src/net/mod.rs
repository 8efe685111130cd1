//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup attempt:
//!     → reclaim.rs (close our old listener or nudge the port, then settle)
//!     → probe.rs (throwaway bind: free / busy / fatal)
//!     → listener.rs (real bind + TLS material from tls.rs)
//!     → TlsListener handed to the HTTP layer
//!
//! Listener States:
//!     Bound → Serving → Closed
//!     Bound → Closed
//! ```
//!
//! # Design Decisions
//! - Probe, reclaim and bind sit behind traits so the startup state machine
//!   can be driven by scripted fakes
//! - "Address in use" is the only retryable bind failure

pub mod listener;
pub mod probe;
pub mod reclaim;
pub mod tls;

pub use listener::{BindError, ListenerBinder, ListenerHandle, ListenerState, TlsBinder, TlsListener};
pub use probe::{PortProbe, ProbeError, TcpPortProbe};
pub use reclaim::{PortReclaimer, SocketReclaimer};
pub use tls::{TlsError, TlsMaterial};
