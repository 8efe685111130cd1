//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Startup attempt fails (port busy):
//!     → backoff.rs (delay before the next attempt)
//!     → clock.rs (Sleeper performs the wait)
//! ```
//!
//! # Design Decisions
//! - Delays go through an injected `Sleeper` so tests run with zero or recorded waits
//! - Fixed backoff by default; exponential with jitter is opt-in

pub mod backoff;
pub mod clock;

pub use backoff::{calculate_backoff, BackoffPolicy};
pub use clock::{Sleeper, TokioSleeper};
