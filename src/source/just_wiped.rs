//! Just-Wiped HTML listing adapter
//!
//! Serves both the recent-wipes listing and the upcoming-wipes listing; the
//! configured base URL (including any query such as `min_rating=40`) picks
//! which one. The site caches aggressively, so requests carry no-cache
//! headers and usually a `nocache` token.
//!
//! Entries are split on the server detail links unless the source sets an
//! `entry-selector` for pages that wrap each server in its own container.

use crate::config::SourceConfig;
use crate::extract::{
    extract_listing_item, split_items, split_listing_entries, ExtractError, ExtractOptions,
    Extraction,
};
use crate::source::fetcher::HttpFetcher;
use crate::source::{FetchFailure, RawItem, RawPage, SourceAdapter};
use crate::ConfigError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;
use url::Url;

pub struct JustWipedAdapter {
    config: SourceConfig,
    fetcher: HttpFetcher,
    base_url: Url,
    options: ExtractOptions,
}

impl JustWipedAdapter {
    pub fn new(config: SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let fetcher = no_cache_fetcher(client, &config)?;

        let options = ExtractOptions {
            min_rating: config.min_rating,
            keep_instant: config.carries_wipe_instant,
        };

        Ok(Self {
            config,
            fetcher,
            base_url,
            options,
        })
    }

    fn page_url(&self, page: u32) -> Url {
        listing_page_url(&self.base_url, self.config.max_pages, page)
    }
}

/// Listing URL for `page`; single-page sources are requested exactly as configured
pub(super) fn listing_page_url(base_url: &Url, max_pages: u32, page: u32) -> Url {
    let mut url = base_url.clone();
    if max_pages > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }
    url
}

/// Fetcher presenting the browser-like no-cache headers the site needs
pub(super) fn no_cache_fetcher(client: Client, config: &SourceConfig) -> Result<HttpFetcher, ConfigError> {
    let mut fetcher = HttpFetcher::new(client, config)?;
    fetcher.default_header("cache-control", "no-cache, no-store, must-revalidate");
    fetcher.default_header("pragma", "no-cache");
    fetcher.default_header("expires", "0");
    Ok(fetcher)
}

#[async_trait]
impl SourceAdapter for JustWipedAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn settings(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch_page(&mut self, page: u32) -> Result<RawPage, FetchFailure> {
        let url = self.page_url(page);
        let html = self.fetcher.get_text(&url).await?;

        let entries = match &self.config.entry_selector {
            Some(selector) => split_items(&html, selector),
            None => split_listing_entries(&html),
        }
        .map_err(|e| FetchFailure::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("{}: page {} holds {} entries", self.config.name, page, entries.len());
        Ok(RawPage::new(page, entries.into_iter().map(RawItem::Html).collect()))
    }

    fn extract(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Extraction {
        match item {
            RawItem::Html(fragment) => extract_listing_item(fragment, observed_at, &self.options),
            RawItem::Json(_) | RawItem::Detail { .. } => {
                Extraction::Malformed(ExtractError::Markup("expected an HTML entry".to_string()))
            }
        }
    }
}
