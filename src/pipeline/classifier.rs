//! Existence classification of a page of candidates

use crate::model::{CandidateServer, ServerRecord};
use crate::storage::{StorageResult, Store};
use std::collections::{HashMap, HashSet};

/// Marks every candidate already known to the store and loads those records
///
/// One membership query covers the whole batch; records are only loaded for
/// ids that are present. The store is never written.
///
/// # Returns
///
/// * `Ok(HashMap)` - Known records keyed by server id (absent ids are new)
/// * `Err(StorageError)` - The store could not be queried
pub fn classify<S: Store + ?Sized>(
    candidates: &mut [CandidateServer],
    store: &S,
) -> StorageResult<HashMap<i64, ServerRecord>> {
    let mut seen = HashSet::new();
    let ids: Vec<i64> = candidates
        .iter()
        .map(|c| c.server_id)
        .filter(|id| seen.insert(*id))
        .collect();

    let present = store.get_many_ids(&ids)?;
    let known = if present.is_empty() {
        HashMap::new()
    } else {
        let present_ids: Vec<i64> = present.into_iter().collect();
        store.get_many(&present_ids)?
    };

    for candidate in candidates.iter_mut() {
        candidate.is_existing = known.contains_key(&candidate.server_id);
    }

    Ok(known)
}
