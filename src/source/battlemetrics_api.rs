//! BattleMetrics REST API adapter

use crate::config::SourceConfig;
use crate::extract::{extract_api_server, ExtractError, ExtractOptions, Extraction};
use crate::source::fetcher::HttpFetcher;
use crate::source::{FetchFailure, RawItem, RawPage, SourceAdapter};
use crate::ConfigError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Page size requested when the source does not configure one
const DEFAULT_PAGE_SIZE: usize = 100;

/// Online Rust servers from the BattleMetrics servers endpoint, most populated first
pub struct BattlemetricsApiAdapter {
    config: SourceConfig,
    fetcher: HttpFetcher,
    base_url: Url,
    options: ExtractOptions,
}

impl BattlemetricsApiAdapter {
    pub fn new(config: SourceConfig, client: Client, token: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut fetcher = HttpFetcher::new(client, &config)?;
        fetcher.set_header("Authorization", &format!("Bearer {}", token))?;
        fetcher.default_header("accept", "application/json");

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
        let page_size = self.config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("filter[game]", "rust")
            .append_pair("filter[status]", "online")
            .append_pair("page[size]", &page_size.to_string())
            .append_pair("page[number]", &page.to_string())
            .append_pair("sort", "-players");
        url
    }
}

#[async_trait]
impl SourceAdapter for BattlemetricsApiAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn settings(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch_page(&mut self, page: u32) -> Result<RawPage, FetchFailure> {
        let url = self.page_url(page);
        let mut body = self.fetcher.get_json(&url).await?;

        let items = match body.get_mut("data").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FetchFailure::Decode {
                    url: url.to_string(),
                    message: "response has no data array".to_string(),
                })
            }
        };

        debug!("{}: page {} returned {} servers", self.config.name, page, items.len());
        Ok(RawPage::new(page, items.into_iter().map(RawItem::Json).collect()))
    }

    fn extract(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Extraction {
        match item {
            RawItem::Json(value) => extract_api_server(value, observed_at, &self.options),
            RawItem::Html(_) | RawItem::Detail { .. } => {
                Extraction::Malformed(ExtractError::Markup("expected a JSON object".to_string()))
            }
        }
    }
}
