//! GPS track data service.
//!
//! Serves stored activity documents over HTTPS from a fixed port. Startup
//! reclaims, probes and binds the port with bounded retries; shutdown closes
//! the listener on SIGINT/SIGTERM, panics and failed tasks, then exits with a
//! defined status.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{ListenerSupervisor, ShutdownCoordinator};
