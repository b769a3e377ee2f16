//! One-time backfill of wipe schedules from the legacy single wipe instant

use crate::model::{NewScheduleEntry, WipeSlot};
use crate::storage::traits::{StorageResult, Store};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a backfill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Servers carrying a legacy `wipe_time`
    pub examined: u64,
    /// Schedule entries inserted
    pub created: u64,
    /// Servers whose slot was already scheduled
    pub already_present: u64,
}

/// Creates the (day, hour) schedule entry implied by every legacy `wipe_time`
///
/// Safe to run repeatedly; a second pass only counts `already_present`.
/// The slot is derived in UTC, which is the offset legacy instants were
/// stored in.
pub fn backfill_legacy_schedules<S: Store + ?Sized>(store: &mut S) -> StorageResult<MigrationReport> {
    let mut report = MigrationReport::default();

    for server in store.servers_with_legacy_wipe_time()? {
        let Some(wipe_time) = server.wipe_time else {
            continue;
        };
        report.examined += 1;

        let slot = WipeSlot::from_instant(&wipe_time);
        if store
            .find_schedule_entry(server.server_id, &slot.day_name, &slot.wipe_hour)?
            .is_some()
        {
            report.already_present += 1;
            continue;
        }

        store.create_schedule_entry(&NewScheduleEntry::new(
            server.server_id,
            slot.day_name,
            slot.wipe_hour,
        ))?;
        debug!("Backfilled schedule for server {}", server.server_id);
        report.created += 1;
    }

    info!(
        "Backfill complete: {} examined, {} created, {} already present",
        report.examined, report.created, report.already_present
    );
    Ok(report)
}
