use chrono::{DateTime, Utc};
use serde::Serialize;

/// Substring marking a server name that was stored before a real name was known
const PLACEHOLDER_MARKER: &str = "Unknown";

/// Name stored for a server whose detail page showed no name
pub const PLACEHOLDER_NAME: &str = "Unknown Server Name";

/// Returns true if a stored display name is a placeholder awaiting enrichment
pub fn is_placeholder_name(name: &str) -> bool {
    name.contains(PLACEHOLDER_MARKER)
}

/// A persisted game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    /// Source-of-truth identity; never reassigned once created
    pub server_id: i64,

    pub server_name: String,

    /// Group-size cap (1-4), unknown when `None`
    pub max_group: Option<u8>,

    /// Legacy single wipe instant
    pub wipe_time: Option<DateTime<Utc>>,
}

impl ServerRecord {
    /// Whether the legacy placeholder repair path applies to this record
    pub fn needs_repair(&self) -> bool {
        is_placeholder_name(&self.server_name) || self.wipe_time.is_none()
    }
}

/// A persisted weekly wipe slot for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WipeScheduleEntry {
    pub id: i64,
    pub server_id: i64,
    pub day_name: String,
    pub wipe_hour: String,
}

/// A wipe slot about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduleEntry {
    pub server_id: i64,
    pub day_name: String,
    pub wipe_hour: String,
}

impl NewScheduleEntry {
    pub fn new(server_id: i64, day_name: impl Into<String>, wipe_hour: impl Into<String>) -> Self {
        Self {
            server_id,
            day_name: day_name.into(),
            wipe_hour: wipe_hour.into(),
        }
    }
}
