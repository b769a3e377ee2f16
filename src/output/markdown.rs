//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of the store
//! and its recent ingestion runs.

use crate::output::stats::LedgerStatistics;
use crate::storage::RunRecord;
use crate::LedgerError;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary to `output_path`
///
/// # Arguments
///
/// * `stats` - Statistics including the runs to list
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(
    stats: &LedgerStatistics,
    output_path: &Path,
) -> Result<(), LedgerError> {
    let markdown = format_markdown_summary(stats);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats statistics and recent runs as markdown
pub fn format_markdown_summary(stats: &LedgerStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Wipe Ledger Ingestion Summary\n\n");

    md.push_str("## Store\n\n");
    md.push_str(&format!("- **Servers**: {}\n", stats.servers));
    md.push_str(&format!("- **Wipe Slots**: {}\n", stats.schedule_entries));
    md.push_str(&format!(
        "- **Unknown Group Size**: {}\n\n",
        stats.unknown_group
    ));

    md.push_str("## Wipe Slots by Day\n\n");
    md.push_str("| Day | Slots |\n");
    md.push_str("|-----|-------|\n");
    for (day, count) in stats.week() {
        md.push_str(&format!("| {} | {} |\n", day, count));
    }
    md.push('\n');

    md.push_str("## Recent Runs\n\n");
    if stats.recent_runs.is_empty() {
        md.push_str("No runs recorded yet.\n");
        return md;
    }

    md.push_str("| Run | Source | Started | Duration | Pages | Created | Added | Duplicate | Updated | Failed | Discarded | Malformed | Stop |\n");
    md.push_str("|-----|--------|---------|----------|-------|---------|-------|-----------|---------|--------|-----------|-----------|------|\n");
    for run in &stats.recent_runs {
        md.push_str(&format_run_row(run));
    }

    let failed: Vec<_> = stats
        .recent_runs
        .iter()
        .filter(|run| run.stop_reason.map_or(false, |r| r.is_abnormal()))
        .collect();
    if !failed.is_empty() {
        md.push_str("\n## Runs Ended Early\n\n");
        for run in failed {
            md.push_str(&format!(
                "- Run {} ({}): {}\n",
                run.id,
                run.source,
                run.stop_reason
                    .map(|r| r.to_string())
                    .unwrap_or_default()
            ));
        }
    }

    md
}

fn format_run_row(run: &RunRecord) -> String {
    let duration = match (
        DateTime::parse_from_rfc3339(&run.started_at),
        DateTime::parse_from_rfc3339(&run.finished_at),
    ) {
        (Ok(started), Ok(finished)) => format!(
            "{}s",
            (finished.with_timezone(&Utc) - started.with_timezone(&Utc)).num_seconds()
        ),
        _ => "-".to_string(),
    };

    format!(
        "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
        run.id,
        run.source,
        run.started_at,
        duration,
        run.pages_processed,
        run.created,
        run.schedule_added,
        run.skipped_duplicate,
        run.updated,
        run.failures,
        run.discarded,
        run.malformed,
        run.stop_reason
            .map(|r| r.to_db_string())
            .unwrap_or("-")
    )
}
