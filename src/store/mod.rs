//! Activity document store.
//!
//! # Data Flow
//! ```text
//! data file (JSON array of activity documents)
//!     → json_file.rs (load once, sort newest first)
//!     → ActivityStore queries from the HTTP handlers
//! ```
//!
//! # Design Decisions
//! - Documents stay schemaless JSON; only `_id`, `metadata.time` and `track.type` are interpreted
//! - Ordering is by `metadata.time`, newest first; undated documents sort last

pub mod activity;
pub mod json_file;

pub use activity::{parse_timestamp, Activity};
pub use json_file::JsonFileStore;

use chrono::{DateTime, Utc};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed activity data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read-only queries over stored activities. Results are newest first.
pub trait ActivityStore: Send + Sync {
    fn all(&self) -> Result<Vec<Activity>, StoreError>;

    fn latest(&self) -> Result<Option<Activity>, StoreError>;

    fn by_id(&self, id: &str) -> Result<Option<Activity>, StoreError>;

    fn by_type(&self, track_type: &str) -> Result<Vec<Activity>, StoreError>;

    /// Activities with `start <= metadata.time <= end`.
    fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Activity>, StoreError>;
}
