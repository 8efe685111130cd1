//! HTTP request pipeline.
//!
//! # Data Flow
//! ```text
//! TLS connection (net::TlsListener)
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (request ID, metrics)
//!     → activities.rs (read-only activity queries)
//!     → response.rs (JSON error bodies)
//!     → static files for anything unrouted
//! ```

pub mod activities;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
