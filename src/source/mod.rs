//! Source adapters
//!
//! One adapter per data source. Each adapter knows how to fetch a page of
//! raw listings (pagination, pacing, retries, client identity) and how to
//! turn one raw listing into a candidate. Nothing source-specific leaks
//! past the `SourceAdapter` trait.
//!
//! # Adapters
//!
//! - `BattlemetricsApiAdapter`: JSON REST API with bearer authentication
//! - `JustWipedAdapter`: HTML listing pages with cache-busting
//! - `JustWipedDetailsAdapter`: detail pages of every server a listing links
//! - `BrowserAdapter`: BattleMetrics pages rendered by a headless browser

mod battlemetrics_api;
mod browser;
mod fetcher;
mod just_wiped;
mod just_wiped_details;
mod throttle;

pub use battlemetrics_api::BattlemetricsApiAdapter;
pub use browser::{BrowserAdapter, ChromeEngine, RenderEngine};
pub use fetcher::{build_http_client, HttpFetcher};
pub use just_wiped::JustWipedAdapter;
pub use just_wiped_details::JustWipedDetailsAdapter;
pub use throttle::Throttle;

use crate::config::{ClientConfig, Credentials, SourceConfig, SourceKind};
use crate::extract::Extraction;
use crate::{ConfigError, LedgerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A page that could not be obtained after every allowed attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("HTTP {status} from {url} after {attempts} attempt(s)")]
    Http { url: String, status: u16, attempts: u32 },

    #[error("network error for {url} after {attempts} attempt(s): {message}")]
    Network {
        url: String,
        message: String,
        attempts: u32,
    },

    #[error("timeout for {url} after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("undecodable response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("render failed for {url}: {message}")]
    Render { url: String, message: String },
}

impl FetchFailure {
    /// Attempts made before giving up (0 for failures that are never retried)
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Http { attempts, .. }
            | Self::Network { attempts, .. }
            | Self::Timeout { attempts, .. } => *attempts,
            Self::Decode { .. } | Self::Render { .. } => 0,
        }
    }
}

/// One raw listing as delivered by a source
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    /// An object from a JSON API response
    Json(Value),
    /// The outer HTML of one listing entry
    Html(String),
    /// A whole server detail page, keyed by the id it was requested for
    Detail { server_id: i64, html: String },
}

/// Raw listings of one page, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub page: u32,
    pub items: Vec<RawItem>,
}

impl RawPage {
    pub fn new(page: u32, items: Vec<RawItem>) -> Self {
        Self { page, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Capability set every data source provides to the pipeline driver
#[async_trait]
pub trait SourceAdapter: Send {
    /// Configured source name
    fn name(&self) -> &str;

    fn settings(&self) -> &SourceConfig;

    /// Fetches page `page` (1-based), including pacing and retries
    async fn fetch_page(&mut self, page: u32) -> Result<RawPage, FetchFailure>;

    /// Turns one raw listing into a candidate, a discard or a malformed item
    fn extract(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Extraction;

    /// Whether another page may follow `page`
    ///
    /// An empty page always ends pagination. With a configured page size,
    /// so does any page shorter than a full one.
    fn has_more(&self, page: &RawPage) -> bool {
        if page.is_empty() {
            return false;
        }
        self.settings()
            .page_size
            .map_or(true, |full| page.len() >= full)
    }

    /// Whether the driver should stop once a page holds only repeats
    fn dedupe_within_run(&self) -> bool {
        self.settings().dedupe_within_run
    }

    /// Releases adapter resources; called on every exit path of a run
    async fn shutdown(&mut self) {}
}

/// Builds the adapter for a configured source
///
/// # Arguments
///
/// * `config` - The source settings
/// * `client` - Shared HTTP client identity and timeouts
/// * `credentials` - Tokens resolved before the run started
///
/// # Returns
///
/// * `Ok(Box<dyn SourceAdapter>)` - Ready adapter
/// * `Err(LedgerError)` - A credential is missing or the HTTP client could not be built
pub fn build_adapter(
    config: SourceConfig,
    client: &ClientConfig,
    credentials: &Credentials,
) -> Result<Box<dyn SourceAdapter>, LedgerError> {
    match config.kind {
        SourceKind::BattlemetricsApi => {
            let token = credentials
                .token(&config.name)
                .ok_or_else(|| ConfigError::MissingCredential {
                    source_name: config.name.clone(),
                    variable: config.api_key_env.clone().unwrap_or_default(),
                })?
                .to_string();
            let http = build_http_client(client).map_err(client_build_error)?;
            Ok(Box::new(BattlemetricsApiAdapter::new(config, http, &token)?))
        }
        SourceKind::JustWiped => {
            let http = build_http_client(client).map_err(client_build_error)?;
            Ok(Box::new(JustWipedAdapter::new(config, http)?))
        }
        SourceKind::JustWipedDetails => {
            let http = build_http_client(client).map_err(client_build_error)?;
            Ok(Box::new(JustWipedDetailsAdapter::new(config, http)?))
        }
        SourceKind::BattlemetricsBrowser => {
            let engine = ChromeEngine::from_config(&config, client)?;
            Ok(Box::new(BrowserAdapter::new(config, engine)?))
        }
    }
}

fn client_build_error(e: reqwest::Error) -> LedgerError {
    LedgerError::Config(ConfigError::Validation(format!(
        "cannot build HTTP client: {}",
        e
    )))
}
