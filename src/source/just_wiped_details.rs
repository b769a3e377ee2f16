//! Just-Wiped detail-page adapter
//!
//! Reads a listing page only for its `/rust_servers/<id>` links, then fetches
//! every linked detail page. Detail pages that lack a name still yield a
//! candidate under the placeholder name, which later listing runs repair.

use crate::config::SourceConfig;
use crate::extract::{
    extract_detail_page, server_ids_from_links, ExtractError, ExtractOptions, Extraction,
};
use crate::source::fetcher::HttpFetcher;
use crate::source::just_wiped::{listing_page_url, no_cache_fetcher};
use crate::source::{FetchFailure, RawItem, RawPage, SourceAdapter};
use crate::ConfigError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

pub struct JustWipedDetailsAdapter {
    config: SourceConfig,
    fetcher: HttpFetcher,
    base_url: Url,
    options: ExtractOptions,
}

impl JustWipedDetailsAdapter {
    pub fn new(config: SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let fetcher = no_cache_fetcher(client, &config)?;
        let options = ExtractOptions {
            min_rating: None,
            keep_instant: config.carries_wipe_instant,
        };

        Ok(Self {
            config,
            fetcher,
            base_url,
            options,
        })
    }

    fn detail_url(&self, server_id: i64) -> Result<Url, FetchFailure> {
        self.base_url
            .join(&format!("/rust_servers/{}", server_id))
            .map_err(|e| FetchFailure::Decode {
                url: self.base_url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SourceAdapter for JustWipedDetailsAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn settings(&self) -> &SourceConfig {
        &self.config
    }

    /// Fetches the listing page, then each linked detail page in turn
    ///
    /// Only the listing request can fail the page; a detail page that cannot
    /// be fetched is logged and left out.
    async fn fetch_page(&mut self, page: u32) -> Result<RawPage, FetchFailure> {
        let listing_url = listing_page_url(&self.base_url, self.config.max_pages, page);
        let html = self.fetcher.get_text(&listing_url).await?;

        let server_ids = server_ids_from_links(&html).map_err(|e| FetchFailure::Decode {
            url: listing_url.to_string(),
            message: e.to_string(),
        })?;
        debug!(
            "{}: page {} links {} server(s)",
            self.config.name,
            page,
            server_ids.len()
        );

        let mut items = Vec::with_capacity(server_ids.len());
        for server_id in server_ids {
            let url = self.detail_url(server_id)?;
            match self.fetcher.get_text(&url).await {
                Ok(html) => items.push(RawItem::Detail { server_id, html }),
                Err(failure) => warn!(
                    "{}: skipping server {}: {}",
                    self.config.name, server_id, failure
                ),
            }
        }

        Ok(RawPage::new(page, items))
    }

    fn extract(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Extraction {
        match item {
            RawItem::Detail { server_id, html } => {
                extract_detail_page(*server_id, html, observed_at, &self.options)
            }
            RawItem::Json(_) | RawItem::Html(_) => {
                Extraction::Malformed(ExtractError::Markup("expected a detail page".to_string()))
            }
        }
    }
}
