//! Activities loaded from a JSON file.

use std::cmp::Reverse;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::store::{Activity, ActivityStore, StoreError};

/// In-memory store backed by a JSON array on disk.
#[derive(Debug, Default)]
pub struct JsonFileStore {
    /// Sorted newest first.
    activities: Vec<Activity>,
}

impl JsonFileStore {
    /// Load `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Activity data file not found, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let activities: Vec<Activity> = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), count = activities.len(), "Activities loaded");
        Ok(Self::from_activities(activities))
    }

    pub fn from_activities(mut activities: Vec<Activity>) -> Self {
        // Stable: equal times keep file order. `None` sorts after every timestamp.
        activities.sort_by_key(|a| Reverse(a.time()));
        Self { activities }
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    fn filtered<F: Fn(&Activity) -> bool>(&self, keep: F) -> Vec<Activity> {
        self.activities.iter().filter(|a| keep(a)).cloned().collect()
    }
}

impl ActivityStore for JsonFileStore {
    fn all(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(self.activities.clone())
    }

    fn latest(&self) -> Result<Option<Activity>, StoreError> {
        Ok(self.activities.first().cloned())
    }

    fn by_id(&self, id: &str) -> Result<Option<Activity>, StoreError> {
        Ok(self.activities.iter().find(|a| a.id() == Some(id)).cloned())
    }

    fn by_type(&self, track_type: &str) -> Result<Vec<Activity>, StoreError> {
        Ok(self.filtered(|a| a.track_type() == Some(track_type)))
    }

    fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Activity>, StoreError> {
        Ok(self.filtered(|a| a.time().is_some_and(|t| start <= t && t <= end)))
    }
}
