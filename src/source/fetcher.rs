//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the lightweight adapters, including:
//! - Building HTTP clients with the configured identity and bounded timeouts
//! - Per-source header identity (referer, cache-control, authorization)
//! - Cache-busting query tokens
//! - Pacing through the source's `Throttle`
//! - Retry with increasing randomized backoff

use crate::config::{ClientConfig, SourceConfig};
use crate::source::throttle::{backoff_delay, Throttle};
use crate::source::FetchFailure;
use crate::ConfigError;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Query parameter carrying the cache-busting token
const CACHE_BUST_PARAM: &str = "nocache";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Shared client identity and timeouts
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Paced, retrying GET requests for one source
pub struct HttpFetcher {
    client: Client,
    throttle: Throttle,
    headers: HeaderMap,
    max_attempts: u32,
    backoff_base: Duration,
    cache_bust: bool,
}

impl HttpFetcher {
    /// Creates a fetcher using the source's pacing, retry and header settings
    pub fn new(client: Client, source: &SourceConfig) -> Result<Self, ConfigError> {
        let mut fetcher = Self {
            client,
            throttle: Throttle::new(source.delay_min_ms, source.delay_max_ms),
            headers: HeaderMap::new(),
            max_attempts: source.max_attempts.max(1),
            backoff_base: Duration::from_millis(source.backoff_base_ms),
            cache_bust: source.cache_bust,
        };

        for (name, value) in &source.headers {
            fetcher.set_header(name, value)?;
        }

        Ok(fetcher)
    }

    /// Sets a header sent with every request, replacing any previous value
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::Validation(format!("invalid value for header '{}'", name)))?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Sets a header only if the source configuration did not already set it
    pub fn default_header(&mut self, name: &'static str, value: &'static str) {
        let header_name = HeaderName::from_static(name);
        if !self.headers.contains_key(&header_name) {
            self.headers
                .insert(header_name, HeaderValue::from_static(value));
        }
    }

    /// Network calls made so far, retries included
    pub fn request_count(&self) -> u32 {
        self.throttle.request_count()
    }

    /// Fetches `url` as text
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return body |
    /// | Non-2xx status | Retry, then `FetchFailure::Http` |
    /// | Timeout | Retry, then `FetchFailure::Timeout` |
    /// | Other transport error | Retry, then `FetchFailure::Network` |
    ///
    /// Every attempt waits on the throttle; retry `n` additionally sleeps
    /// `backoff * n` plus jitter.
    pub async fn get_text(&mut self, url: &Url) -> Result<String, FetchFailure> {
        let mut last_failure = None;

        for attempt in 1..=self.max_attempts {
            self.throttle.acquire().await;

            let request_url = self.request_url(url);
            debug!("GET {} (attempt {}/{})", request_url, attempt, self.max_attempts);

            match self.attempt(&request_url, attempt).await {
                Ok(body) => return Ok(body),
                Err(failure) => {
                    warn!("{}", failure);
                    last_failure = Some(failure);
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(backoff_delay(self.backoff_base, attempt)).await;
            }
        }

        Err(last_failure.unwrap_or_else(|| FetchFailure::Network {
            url: url.to_string(),
            message: "no attempt made".to_string(),
            attempts: 0,
        }))
    }

    /// Fetches `url` and decodes the body as JSON
    pub async fn get_json(&mut self, url: &Url) -> Result<Value, FetchFailure> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchFailure::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn attempt(&self, url: &Url, attempt: u32) -> Result<String, FetchFailure> {
        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| transport_failure(url, &e, attempt))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Http {
                url: url.to_string(),
                status: status.as_u16(),
                attempts: attempt,
            });
        }

        response
            .text()
            .await
            .map_err(|e| transport_failure(url, &e, attempt))
    }

    fn request_url(&self, url: &Url) -> Url {
        if !self.cache_bust {
            return url.clone();
        }

        let token: u32 = rand::thread_rng().gen_range(1..=1_000_000);
        let mut busted = url.clone();
        busted
            .query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &token.to_string());
        busted
    }
}

fn transport_failure(url: &Url, error: &reqwest::Error, attempts: u32) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::Timeout {
            url: url.to_string(),
            attempts,
        }
    } else {
        FetchFailure::Network {
            url: url.to_string(),
            message: error.to_string(),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use std::collections::BTreeMap;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(base_url: &str) -> SourceConfig {
        SourceConfig {
            name: "test".to_string(),
            kind: SourceKind::JustWiped,
            base_url: base_url.to_string(),
            page_size: None,
            max_pages: 1,
            delay_min_ms: 0,
            delay_max_ms: 0,
            max_attempts: 3,
            backoff_base_ms: 0,
            cache_bust: false,
            dedupe_within_run: false,
            min_rating: None,
            carries_wipe_instant: false,
            api_key_env: None,
            browser_binary: None,
            render_wait_ms: 0,
            entry_selector: None,
            headers: BTreeMap::new(),
        }
    }

    fn fetcher(config: &SourceConfig) -> HttpFetcher {
        let client = build_http_client(&ClientConfig::default()).unwrap();
        HttpFetcher::new(client, config).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = source("https://example.com");
        config
            .headers
            .insert("Bad Header".to_string(), "x".to_string());
        let client = build_http_client(&ClientConfig::default()).unwrap();
        assert!(HttpFetcher::new(client, &config).is_err());
    }

    #[test]
    fn test_cache_bust_token_appended() {
        let mut config = source("https://just-wiped.net/rust_servers");
        config.cache_bust = true;
        let fetcher = fetcher(&config);

        let url = Url::parse("https://just-wiped.net/rust_servers?min_rating=40").unwrap();
        let busted = fetcher.request_url(&url);
        let token: u32 = busted
            .query_pairs()
            .find(|(k, _)| k == CACHE_BUST_PARAM)
            .map(|(_, v)| v.parse().unwrap())
            .unwrap();
        assert!((1..=1_000_000).contains(&token));
        assert!(busted.query_pairs().any(|(k, v)| k == "min_rating" && v == "40"));
    }

    #[tokio::test]
    async fn test_success_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(header("referer", "https://just-wiped.net/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = source(&server.uri());
        config
            .headers
            .insert("Referer".to_string(), "https://just-wiped.net/".to_string());
        let mut fetcher = fetcher(&config);

        let url = Url::parse(&format!("{}/list", server.uri())).unwrap();
        let body = fetcher.get_text(&url).await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let config = source(&server.uri());
        let mut fetcher = fetcher(&config);

        let url = Url::parse(&server.uri()).unwrap();
        match fetcher.get_text(&url).await {
            Err(FetchFailure::Http {
                status, attempts, ..
            }) => {
                assert_eq!(status, 503);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected HTTP failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": []}"))
            .mount(&server)
            .await;

        let config = source(&server.uri());
        let mut fetcher = fetcher(&config);

        let url = Url::parse(&server.uri()).unwrap();
        let json = fetcher.get_json(&url).await.unwrap();
        assert!(json["data"].as_array().unwrap().is_empty());
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let config = source(&server.uri());
        let mut fetcher = fetcher(&config);

        let url = Url::parse(&format!("{}/?page=1", server.uri())).unwrap();
        assert!(matches!(
            fetcher.get_json(&url).await,
            Err(FetchFailure::Decode { .. })
        ));
    }
}
