//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events: console, combined/error/access files)
//!     → metrics.rs (startup attempts, HTTP requests)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → logs/*.log (daily rolling JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the HTTP trace span
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingGuard};
