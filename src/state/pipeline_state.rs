/// Pipeline state definitions for one ingestion run of one source
///
/// `Start -> Fetching -> Extracting -> Reconciling -> (Fetching | Stopped)`
use serde::Serialize;
use std::fmt;

/// Where a source's ingestion run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Run created, no page requested yet
    Start,

    /// Waiting on the adapter for a page
    Fetching { page: u32 },

    /// Turning the page's raw items into candidates
    Extracting { page: u32 },

    /// Merging the page's candidates into the store
    Reconciling { page: u32 },

    /// Terminal: no further pages will be requested
    Stopped,
}

impl PipelineState {
    /// Checks whether moving to `next` is a legal step
    ///
    /// Any non-terminal state may stop. Pages advance by exactly one.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Start, Fetching { page }) => *page == 1,
            (Fetching { page: a }, Extracting { page: b }) => a == b,
            (Extracting { page: a }, Reconciling { page: b }) => a == b,
            (Reconciling { page: a }, Fetching { page: b }) => *b == a + 1,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Fetching { page } => write!(f, "fetching(page {})", page),
            Self::Extracting { page } => write!(f, "extracting(page {})", page),
            Self::Reconciling { page } => write!(f, "reconciling(page {})", page),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The adapter exhausted its retries on a page
    FetchFailed,
    /// A page produced no candidates
    EmptyPage,
    /// A page held fewer raw items than a full page
    ShortPage,
    /// The configured page budget was used up
    MaxPages,
    /// Every candidate on the page was already seen earlier in this run
    AllDuplicates,
    /// The run was cancelled between pages
    Cancelled,
}

impl StopReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FetchFailed => "fetch_failed",
            Self::EmptyPage => "empty_page",
            Self::ShortPage => "short_page",
            Self::MaxPages => "max_pages",
            Self::AllDuplicates => "all_duplicates",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetch_failed" => Some(Self::FetchFailed),
            "empty_page" => Some(Self::EmptyPage),
            "short_page" => Some(Self::ShortPage),
            "max_pages" => Some(Self::MaxPages),
            "all_duplicates" => Some(Self::AllDuplicates),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true if the stop reflects a problem rather than the end of data
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::Cancelled)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
