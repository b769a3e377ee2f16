//! Statistics generation from the ledger database
//!
//! This module provides functionality for extracting and displaying
//! store statistics from the storage layer.

use crate::extract::weekday_name;
use crate::storage::{RunRecord, Store};
use crate::LedgerError;
use chrono::Weekday;
use std::collections::HashMap;

/// Number of recent runs shown by `--stats`
pub const RECENT_RUN_LIMIT: usize = 10;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct LedgerStatistics {
    /// Total number of known servers
    pub servers: u64,

    /// Total number of weekly wipe slots
    pub schedule_entries: u64,

    /// Servers whose group cap could not be inferred
    pub unknown_group: u64,

    /// Wipe slots per weekday name
    pub slots_by_day: HashMap<String, u64>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

impl LedgerStatistics {
    /// Slots per weekday, Monday first, including empty days
    pub fn week(&self) -> Vec<(&'static str, u64)> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .map(|day| {
            let name = weekday_name(day);
            (name, self.slots_by_day.get(name).copied().unwrap_or(0))
        })
        .collect()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
/// * `run_limit` - How many recent runs to include
///
/// # Returns
///
/// * `Ok(LedgerStatistics)` - Successfully loaded statistics
/// * `Err(LedgerError)` - Failed to query statistics
pub fn load_statistics<S: Store + ?Sized>(
    store: &S,
    run_limit: usize,
) -> Result<LedgerStatistics, LedgerError> {
    Ok(LedgerStatistics {
        servers: store.count_servers()?,
        schedule_entries: store.count_schedule_entries()?,
        unknown_group: store.count_unknown_group()?,
        slots_by_day: store.schedule_day_breakdown()?,
        recent_runs: store.recent_runs(run_limit)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Wipe Ledger Statistics ===\n");

    println!("Overview:");
    println!("  Servers: {}", stats.servers);
    println!("  Wipe slots: {}", stats.schedule_entries);
    let unknown_pct = if stats.servers > 0 {
        (stats.unknown_group as f64 / stats.servers as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Unknown group size: {} ({:.1}%)",
        stats.unknown_group, unknown_pct
    );
    println!();

    println!("Wipe Slots by Day:");
    for (day, count) in stats.week() {
        println!("  {:<9} {}", day, count);
    }
    println!();

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} at {}: {} pages, {} created, {} added, {} duplicate, {} updated, {} failed ({})",
                run.id,
                run.source,
                run.started_at,
                run.pages_processed,
                run.created,
                run.schedule_added,
                run.skipped_duplicate,
                run.updated,
                run.failures,
                run.stop_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
    }
}
