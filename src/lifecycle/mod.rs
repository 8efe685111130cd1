//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ListenerSupervisor: reclaim → probe → bind, retried with backoff
//!     → Bound: listener handed to the HTTP layer
//!     → Failed: StartupError reported to the process boundary once
//!
//! Shutdown (shutdown.rs):
//!     Trigger received → close listener (bounded wait) → exit with status
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT, panics, failed tasks → one channel → ShutdownCoordinator
//! ```
//!
//! # Design Decisions
//! - The supervisor owns the listener; the coordinator only holds a `Weak`
//! - Exiting goes through `ProcessExit` so both sides are testable without ending the test process
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{ProcessExit, ShutdownCoordinator, ShutdownTrigger, StdProcessExit, EXIT_FAULT, EXIT_GRACEFUL};
pub use startup::{
    start_or_exit, AttemptOutcome, AttemptRecord, FatalBind, ListenerSlot, ListenerSupervisor, StartupError,
    SupervisorSettings, SupervisorState, EXIT_CONFIGURATION, EXIT_RETRIES_EXHAUSTED,
};
