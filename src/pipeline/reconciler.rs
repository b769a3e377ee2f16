//! Merging candidates into the store
//!
//! Each candidate ends in exactly one outcome:
//!
//! | Store state | Candidate | Outcome |
//! |-------------|-----------|---------|
//! | Unknown id | any | `Created`: server plus one schedule entry |
//! | Known, needs repair | carries a wipe instant that changes the record | `Updated`: placeholder fields repaired |
//! | Known | slot not scheduled | `ScheduleAdded` |
//! | Known | slot already scheduled | `SkippedDuplicate` |
//!
//! Overlapping runs race only on the store's unique keys: losing a create
//! merges the candidate as known, losing a slot insert counts as a
//! duplicate. Any other store error for one candidate is logged and
//! counted in `failures`; the rest of the batch is still reconciled.

use crate::model::{is_placeholder_name, CandidateServer, NewScheduleEntry, ServerRecord};
use crate::storage::{StorageError, StorageResult, Store};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::AddAssign;
use tracing::{debug, info, warn};

/// What reconciliation did with one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    ScheduleAdded,
    SkippedDuplicate,
    Updated,
}

/// Per-outcome totals of a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileCounts {
    pub created: u32,
    pub schedule_added: u32,
    pub skipped_duplicate: u32,
    pub updated: u32,
    pub failures: u32,
}

impl ReconcileCounts {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::ScheduleAdded => self.schedule_added += 1,
            Outcome::SkippedDuplicate => self.skipped_duplicate += 1,
            Outcome::Updated => self.updated += 1,
        }
    }

    /// Candidates handled, failures included
    pub fn total(&self) -> u32 {
        self.created + self.schedule_added + self.skipped_duplicate + self.updated + self.failures
    }
}

impl AddAssign for ReconcileCounts {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.schedule_added += other.schedule_added;
        self.skipped_duplicate += other.skipped_duplicate;
        self.updated += other.updated;
        self.failures += other.failures;
    }
}

/// Reconciles `candidates` in order against the store
///
/// # Arguments
///
/// * `candidates` - Classified candidates of one page
/// * `known` - Records loaded by the classifier; updated as servers are created or repaired
/// * `store` - The store to write to
pub fn reconcile<S: Store + ?Sized>(
    candidates: &[CandidateServer],
    known: &mut HashMap<i64, ServerRecord>,
    store: &mut S,
) -> ReconcileCounts {
    let mut counts = ReconcileCounts::default();

    for candidate in candidates {
        match reconcile_one(candidate, known, store) {
            Ok(outcome) => {
                log_outcome(candidate, outcome);
                counts.record(outcome);
            }
            Err(e) => {
                warn!(
                    "Failed to persist server {} ({}): {}",
                    candidate.server_id, candidate.server_name, e
                );
                counts.failures += 1;
            }
        }
    }

    counts
}

fn reconcile_one<S: Store + ?Sized>(
    candidate: &CandidateServer,
    known: &mut HashMap<i64, ServerRecord>,
    store: &mut S,
) -> StorageResult<Outcome> {
    if !known.contains_key(&candidate.server_id) {
        let record = ServerRecord {
            server_id: candidate.server_id,
            server_name: candidate.server_name.clone(),
            max_group: candidate.max_group,
            wipe_time: candidate.wipe_time,
        };
        match store.create(&record) {
            Ok(record) => {
                insert_slot(candidate, store)?;
                known.insert(record.server_id, record);
                return Ok(Outcome::Created);
            }
            // Another run created the server after this page was classified
            Err(StorageError::Duplicate(_)) => {
                let stored = store
                    .get(candidate.server_id)?
                    .ok_or(StorageError::NotFound(candidate.server_id))?;
                debug!(
                    "Server {} was created concurrently, merging as known",
                    candidate.server_id
                );
                known.insert(stored.server_id, stored);
            }
            Err(e) => return Err(e),
        }
    }

    let existing = known
        .get(&candidate.server_id)
        .ok_or(StorageError::NotFound(candidate.server_id))?;

    if candidate.wipe_time.is_some() && existing.needs_repair() {
        let repaired = repair(existing, candidate);
        if repaired != *existing {
            store.update(&repaired)?;
            known.insert(repaired.server_id, repaired);
            return Ok(Outcome::Updated);
        }
    }

    insert_slot(candidate, store)
}

/// Adds the candidate's slot unless the store already holds it
fn insert_slot<S: Store + ?Sized>(candidate: &CandidateServer, store: &mut S) -> StorageResult<Outcome> {
    let slot = &candidate.slot;
    if store
        .find_schedule_entry(candidate.server_id, &slot.day_name, &slot.wipe_hour)?
        .is_some()
    {
        return Ok(Outcome::SkippedDuplicate);
    }

    match store.create_schedule_entry(&schedule_entry(candidate)) {
        Ok(_) => Ok(Outcome::ScheduleAdded),
        Err(StorageError::Duplicate(_)) => Ok(Outcome::SkippedDuplicate),
        Err(e) => Err(e),
    }
}

/// Fills a placeholder record from a more informative candidate
///
/// Name and group cap are replaced only when the stored name is a
/// placeholder; the wipe instant is only ever filled, never overwritten.
fn repair(existing: &ServerRecord, candidate: &CandidateServer) -> ServerRecord {
    let mut repaired = existing.clone();

    if is_placeholder_name(&existing.server_name) {
        repaired.server_name = candidate.server_name.clone();
        repaired.max_group = candidate.max_group;
    }
    if repaired.wipe_time.is_none() {
        repaired.wipe_time = candidate.wipe_time;
    }

    repaired
}

fn schedule_entry(candidate: &CandidateServer) -> NewScheduleEntry {
    NewScheduleEntry::new(
        candidate.server_id,
        candidate.slot.day_name.clone(),
        candidate.slot.wipe_hour.clone(),
    )
}

fn log_outcome(candidate: &CandidateServer, outcome: Outcome) {
    let slot = &candidate.slot;
    match outcome {
        Outcome::Created => info!(
            "Created server {} ({}) wiping {} {}",
            candidate.server_id, candidate.server_name, slot.day_name, slot.wipe_hour
        ),
        Outcome::ScheduleAdded => info!(
            "Added wipe slot {} {} to server {}",
            slot.day_name, slot.wipe_hour, candidate.server_id
        ),
        Outcome::Updated => info!(
            "Repaired server {} as '{}'",
            candidate.server_id, candidate.server_name
        ),
        Outcome::SkippedDuplicate => warn!(
            "Server {} already has wipe slot {} {}",
            candidate.server_id, slot.day_name, slot.wipe_hour
        ),
    }
}
