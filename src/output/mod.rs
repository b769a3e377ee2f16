//! Output module for statistics, summaries and side files
//!
//! This module handles:
//! - Store statistics and recent runs (`--stats`)
//! - Markdown summaries of recent runs (`--export-summary`)
//! - The JSON export of already-known server names

mod export;
mod markdown;
pub mod stats;

pub use export::{collect_existing_names, export_names};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, LedgerStatistics, RECENT_RUN_LIMIT};
