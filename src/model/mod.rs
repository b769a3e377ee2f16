//! Domain types shared by extraction, reconciliation and storage
//!
//! - `ServerRecord` / `WipeScheduleEntry`: persisted entities
//! - `CandidateServer`: transient value produced by extraction for one listing

mod candidate;
mod record;

pub use candidate::{CandidateServer, WipeSlot};
pub use record::{
    is_placeholder_name, NewScheduleEntry, ServerRecord, WipeScheduleEntry, PLACEHOLDER_NAME,
};
