//! Extraction of canonical candidates from raw source items
//!
//! This module turns one raw listing (a JSON object from the API or an HTML
//! fragment from a listing page) into a `CandidateServer`, including:
//! - Numeric identity parsing from fields or detail-page links
//! - Group-size inference from the display name
//! - Wipe instant normalization to (weekday, Eastern hour)
//! - The rating quality gate for listing sources
//!
//! Extraction never fails a page: a bad item becomes `Extraction::Malformed`
//! and a gated item becomes `Extraction::Discarded` with a named reason.

mod api;
mod group;
mod identity;
mod listing;
mod wipe;

pub use api::extract_api_server;
pub use group::{infer_max_group, resolve_max_group};
pub use identity::{server_id_from_href, server_id_from_json};
pub use listing::{
    extract_browser_cell, extract_detail_page, extract_listing_item, parse_rating,
    server_ids_from_links, split_items, split_listing_entries,
};
pub use wipe::{day_name, format_wipe_hour, instant_or, parse_instant, weekday_name};

use crate::model::CandidateServer;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a raw item could not be turned into a candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("non-numeric server id: '{0}'")]
    NonNumericId(String),

    #[error("empty server name")]
    EmptyName,

    #[error("invalid markup: {0}")]
    Markup(String),
}

/// Per-source extraction settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Quality threshold (rating percent); `None` disables the gate
    pub min_rating: Option<u8>,

    /// Carry the observed wipe instant on the candidate (legacy path)
    pub keep_instant: bool,
}

/// Named reason a well-formed listing was kept out of reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    BelowRating { rating: u8, threshold: u8 },
    MissingRating { threshold: u8 },
}

impl DiscardReason {
    /// Stable label used to aggregate discard counts
    pub fn label(&self) -> &'static str {
        match self {
            Self::BelowRating { .. } => "below_rating",
            Self::MissingRating { .. } => "missing_rating",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowRating { rating, threshold } => {
                write!(f, "rating {}% below threshold {}%", rating, threshold)
            }
            Self::MissingRating { threshold } => {
                write!(f, "no rating shown (threshold {}%)", threshold)
            }
        }
    }
}

/// A discarded listing with enough identity to attribute the discard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discard {
    pub server_id: i64,
    pub server_name: String,
    pub reason: DiscardReason,
}

/// Outcome of extracting one raw item
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Candidate(CandidateServer),
    Discarded(Discard),
    Malformed(ExtractError),
}

/// Applies the quality gate to an already-identified listing
pub(crate) fn apply_rating_gate(
    rating: Option<u8>,
    options: &ExtractOptions,
) -> Option<DiscardReason> {
    let threshold = options.min_rating?;
    match rating {
        Some(rating) if rating < threshold => Some(DiscardReason::BelowRating { rating, threshold }),
        Some(_) => None,
        None => Some(DiscardReason::MissingRating { threshold }),
    }
}
