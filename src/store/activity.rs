//! A single stored activity document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GPS track document, kept as the JSON it was stored as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Activity(Value);

impl Activity {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn document(&self) -> &Value {
        &self.0
    }

    /// `_id` as a plain string or extended JSON `{"$oid": ...}`.
    pub fn id(&self) -> Option<&str> {
        match self.0.get("_id")? {
            Value::String(id) => Some(id),
            Value::Object(map) => map.get("$oid").and_then(Value::as_str),
            _ => None,
        }
    }

    /// `metadata.time` as an RFC 3339 string or extended JSON `{"$date": ...}`.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.get("metadata")?.get("time")?;
        let text = match raw {
            Value::String(text) => text.as_str(),
            Value::Object(map) => map.get("$date").and_then(Value::as_str)?,
            _ => return None,
        };
        parse_timestamp(text)
    }

    /// `track.type`, e.g. `"running"` or `"cycling"`.
    pub fn track_type(&self) -> Option<&str> {
        self.0.get("track")?.get("type")?.as_str()
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
