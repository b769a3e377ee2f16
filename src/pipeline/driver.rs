//! Pipeline driver
//!
//! Runs one source from its first page until a stop condition:
//!
//! ```text
//! Start -> Fetching(n) -> Extracting(n) -> Reconciling(n) -> Fetching(n+1) | Stopped
//! ```
//!
//! # Stop conditions
//!
//! | Condition | Stop reason |
//! |-----------|-------------|
//! | Cancellation requested before a page | `Cancelled` |
//! | Adapter gave up on the page | `FetchFailed` |
//! | Page produced no candidates | `EmptyPage` |
//! | Only repeats of earlier pages (dedup sources) | `AllDuplicates` |
//! | Fewer raw items than a full page | `ShortPage` |
//! | `max-pages` reached | `MaxPages` |

use crate::extract::Extraction;
use crate::model::CandidateServer;
use crate::pipeline::classifier::classify;
use crate::pipeline::reconciler::reconcile;
use crate::pipeline::report::RunReport;
use crate::source::SourceAdapter;
use crate::state::{PipelineState, StopReason};
use crate::storage::Store;
use chrono::Utc;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Runs one ingestion pass over a source and returns its report
///
/// The adapter is always shut down before returning. The report is
/// logged but not persisted; see `pipeline::run_sources`.
pub async fn run_source<S: Store + ?Sized>(
    adapter: &mut dyn SourceAdapter,
    store: &mut S,
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport::new(adapter.name());
    info!("{}: starting run", adapter.name());

    let stop = drive(adapter, store, cancel, &mut report).await;

    adapter.shutdown().await;
    report.finish(stop);
    report.log();
    report
}

async fn drive<S: Store + ?Sized>(
    adapter: &mut dyn SourceAdapter,
    store: &mut S,
    cancel: &CancellationToken,
    report: &mut RunReport,
) -> StopReason {
    let max_pages = adapter.settings().max_pages.max(1);
    let dedupe = adapter.dedupe_within_run();
    let mut seen_in_run: HashSet<i64> = HashSet::new();
    let mut state = PipelineState::Start;
    let mut page = 1;

    loop {
        if cancel.is_cancelled() {
            info!("{}: cancelled before page {}", adapter.name(), page);
            return stop(state, StopReason::Cancelled);
        }

        state = advance(state, PipelineState::Fetching { page });
        let raw = match adapter.fetch_page(page).await {
            Ok(raw) => raw,
            Err(failure) => {
                warn!("{}: page {} failed: {}", adapter.name(), page, failure);
                return stop(state, StopReason::FetchFailed);
            }
        };
        report.pages_processed += 1;

        state = advance(state, PipelineState::Extracting { page });
        let mut candidates = extract_page(adapter, &raw.items, report);
        debug!(
            "{}: page {} yielded {} candidate(s) from {} item(s)",
            adapter.name(),
            page,
            candidates.len(),
            raw.len()
        );

        if candidates.is_empty() {
            return stop(state, StopReason::EmptyPage);
        }

        if dedupe {
            if candidates.iter().all(|c| seen_in_run.contains(&c.server_id)) {
                info!("{}: page {} only repeats earlier pages", adapter.name(), page);
                return stop(state, StopReason::AllDuplicates);
            }
            candidates.retain(|c| seen_in_run.insert(c.server_id));
        }

        state = advance(state, PipelineState::Reconciling { page });
        match classify(&mut candidates, &*store) {
            Ok(mut known) => {
                for candidate in candidates.iter().filter(|c| c.is_existing) {
                    report.record_existing_name(&candidate.server_name);
                }
                report.add_counts(reconcile(&candidates, &mut known, store));
            }
            Err(e) => {
                warn!(
                    "{}: existence check failed for page {}: {}",
                    adapter.name(),
                    page,
                    e
                );
                report.failures += candidates.len() as u32;
            }
        }

        if !adapter.has_more(&raw) {
            return stop(state, StopReason::ShortPage);
        }
        if page >= max_pages {
            return stop(state, StopReason::MaxPages);
        }

        page += 1;
    }
}

/// Extracts every raw item, recording discards and malformed items on the report
fn extract_page(
    adapter: &dyn SourceAdapter,
    items: &[crate::source::RawItem],
    report: &mut RunReport,
) -> Vec<CandidateServer> {
    let observed_at = Utc::now();
    let mut candidates = Vec::with_capacity(items.len());

    for item in items {
        match adapter.extract(item, observed_at) {
            Extraction::Candidate(candidate) => candidates.push(candidate),
            Extraction::Discarded(discard) => {
                warn!(
                    "{}: discarded server {} ({}): {}",
                    adapter.name(),
                    discard.server_id,
                    discard.server_name,
                    discard.reason
                );
                report.record_discard(&discard);
            }
            Extraction::Malformed(e) => {
                warn!("{}: skipped malformed item: {}", adapter.name(), e);
                report.malformed += 1;
            }
        }
    }

    candidates
}

fn advance(from: PipelineState, to: PipelineState) -> PipelineState {
    debug_assert!(
        from.can_transition_to(&to),
        "invalid pipeline transition {} -> {}",
        from,
        to
    );
    trace!("{} -> {}", from, to);
    to
}

fn stop(from: PipelineState, reason: StopReason) -> StopReason {
    advance(from, PipelineState::Stopped);
    reason
}
