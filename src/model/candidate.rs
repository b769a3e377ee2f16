use crate::extract::{day_name, format_wipe_hour};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::Serialize;

/// A normalized weekly wipe slot: weekday name plus Eastern hour token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WipeSlot {
    /// Full English weekday name, e.g. "Thursday"
    pub day_name: String,

    /// Hour token such as "1pm est"
    pub wipe_hour: String,
}

impl WipeSlot {
    /// Derives the slot from a wipe instant
    ///
    /// The weekday is taken in the instant's own offset, the hour in US Eastern.
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self {
            day_name: day_name(instant),
            wipe_hour: format_wipe_hour(instant),
        }
    }
}

/// One server listing after extraction, before reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateServer {
    pub server_id: i64,
    pub server_name: String,
    pub max_group: Option<u8>,
    pub slot: WipeSlot,

    /// Observed wipe instant; only set by sources on the legacy instant path
    pub wipe_time: Option<DateTime<Utc>>,

    /// Set by the existence classifier
    pub is_existing: bool,
}

impl CandidateServer {
    /// Builds a candidate whose slot is derived from `instant`
    ///
    /// `keep_instant` selects the legacy path where the instant itself is
    /// carried through to reconciliation.
    pub fn from_instant(
        server_id: i64,
        server_name: impl Into<String>,
        max_group: Option<u8>,
        instant: DateTime<FixedOffset>,
        keep_instant: bool,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            max_group,
            slot: WipeSlot::from_instant(&instant),
            wipe_time: keep_instant.then(|| instant.with_timezone(&Utc)),
            is_existing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_utc_instant() {
        // 2024-01-04 is a Thursday; 18:00 UTC is 1pm EST
        let instant = DateTime::parse_from_rfc3339("2024-01-04T18:00:00Z").unwrap();
        let slot = WipeSlot::from_instant(&instant);
        assert_eq!(slot.day_name, "Thursday");
        assert_eq!(slot.wipe_hour, "1pm est");
    }

    #[test]
    fn test_candidate_keeps_instant_only_on_legacy_path() {
        let instant = DateTime::parse_from_rfc3339("2024-01-04T18:00:00Z").unwrap();

        let legacy = CandidateServer::from_instant(7, "Solo Only", Some(1), instant, true);
        assert_eq!(legacy.wipe_time, Some(instant.with_timezone(&Utc)));
        assert!(!legacy.is_existing);

        let scheduled = CandidateServer::from_instant(7, "Solo Only", Some(1), instant, false);
        assert_eq!(scheduled.wipe_time, None);
        assert_eq!(scheduled.slot, legacy.slot);
    }
}
