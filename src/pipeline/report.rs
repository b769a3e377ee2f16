//! Run report for one source
//!
//! The report is the single record of what a run did. Logging and the
//! persisted `ingest_runs` row are both derived from it.

use crate::extract::Discard;
use crate::pipeline::reconciler::ReconcileCounts;
use crate::state::StopReason;
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Structured summary of one source's ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: String,
    pub pages_processed: u32,
    pub created: u32,
    pub schedule_added: u32,
    pub skipped_duplicate: u32,
    pub updated: u32,
    pub failures: u32,

    /// Listings dropped by the quality gate
    pub discarded: u32,
    /// Discards per reason label
    pub discard_reasons: BTreeMap<String, u32>,
    /// Listings that could not be extracted
    pub malformed: u32,

    pub stop_reason: Option<StopReason>,

    /// Names of candidates already in the store, unique, first-seen order
    pub existing_names: Vec<String>,
    #[serde(skip)]
    seen_names: HashSet<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pages_processed: 0,
            created: 0,
            schedule_added: 0,
            skipped_duplicate: 0,
            updated: 0,
            failures: 0,
            discarded: 0,
            discard_reasons: BTreeMap::new(),
            malformed: 0,
            stop_reason: None,
            existing_names: Vec::new(),
            seen_names: HashSet::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn add_counts(&mut self, counts: ReconcileCounts) {
        self.created += counts.created;
        self.schedule_added += counts.schedule_added;
        self.skipped_duplicate += counts.skipped_duplicate;
        self.updated += counts.updated;
        self.failures += counts.failures;
    }

    pub fn record_discard(&mut self, discard: &Discard) {
        self.discarded += 1;
        *self
            .discard_reasons
            .entry(discard.reason.label().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_existing_name(&mut self, name: &str) {
        if self.seen_names.insert(name.to_string()) {
            self.existing_names.push(name.to_string());
        }
    }

    pub fn finish(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    /// Reconciliation totals as a counts value
    pub fn counts(&self) -> ReconcileCounts {
        ReconcileCounts {
            created: self.created,
            schedule_added: self.schedule_added,
            skipped_duplicate: self.skipped_duplicate,
            updated: self.updated,
            failures: self.failures,
        }
    }

    /// Emits the summary through `tracing`
    pub fn log(&self) {
        let stop = self
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "running".to_string());

        info!(
            "{}: {} page(s), {} created, {} schedule added, {} duplicate, {} updated, {} failed, {} discarded, {} malformed (stopped: {})",
            self.source,
            self.pages_processed,
            self.created,
            self.schedule_added,
            self.skipped_duplicate,
            self.updated,
            self.failures,
            self.discarded,
            self.malformed,
            stop
        );

        for (reason, count) in &self.discard_reasons {
            info!("{}: {} discarded as {}", self.source, count, reason);
        }

        if self.stop_reason.map_or(false, |r| r.is_abnormal()) {
            warn!("{}: run ended early ({})", self.source, stop);
        }
    }

    /// Converts the report to the row persisted in `ingest_runs`
    pub fn to_record(&self, config_hash: &str) -> RunRecord {
        let finished_at = self.finished_at.unwrap_or_else(Utc::now);
        RunRecord {
            id: 0,
            source: self.source.clone(),
            started_at: self.started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            config_hash: config_hash.to_string(),
            pages_processed: self.pages_processed,
            created: self.created,
            schedule_added: self.schedule_added,
            skipped_duplicate: self.skipped_duplicate,
            updated: self.updated,
            failures: self.failures,
            discarded: self.discarded,
            malformed: self.malformed,
            stop_reason: self.stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DiscardReason;

    #[test]
    fn test_existing_names_unique_in_order() {
        let mut report = RunReport::new("bm-api");
        report.record_existing_name("Beta");
        report.record_existing_name("Alpha");
        report.record_existing_name("Beta");

        assert_eq!(report.existing_names, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn test_discards_grouped_by_reason() {
        let mut report = RunReport::new("jw");
        let discard = |reason| Discard {
            server_id: 1,
            server_name: "x".to_string(),
            reason,
        };
        report.record_discard(&discard(DiscardReason::BelowRating {
            rating: 55,
            threshold: 60,
        }));
        report.record_discard(&discard(DiscardReason::BelowRating {
            rating: 10,
            threshold: 60,
        }));
        report.record_discard(&discard(DiscardReason::MissingRating { threshold: 60 }));

        assert_eq!(report.discarded, 3);
        assert_eq!(report.discard_reasons["below_rating"], 2);
        assert_eq!(report.discard_reasons["missing_rating"], 1);
    }

    #[test]
    fn test_to_record() {
        let mut report = RunReport::new("jw");
        report.pages_processed = 2;
        report.add_counts(ReconcileCounts {
            created: 3,
            schedule_added: 1,
            skipped_duplicate: 4,
            updated: 0,
            failures: 1,
        });
        report.finish(StopReason::ShortPage);

        let record = report.to_record("hash");
        assert_eq!(record.source, "jw");
        assert_eq!(record.created, 3);
        assert_eq!(record.failures, 1);
        assert_eq!(record.stop_reason, Some(StopReason::ShortPage));
        assert_eq!(record.config_hash, "hash");
        assert_eq!(report.counts().total(), 9);
    }

    #[test]
    fn test_report_serializes_without_private_state() {
        let mut report = RunReport::new("jw");
        report.record_existing_name("Alpha");
        report.finish(StopReason::EmptyPage);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stop_reason"], "empty_page");
        assert!(json.get("seen_names").is_none());
    }
}
