//! Browser-rendered BattleMetrics adapter
//!
//! The BattleMetrics server list is built client-side, so this source needs
//! a real browser engine. The engine is started lazily on the first page,
//! reused for the rest of the run, and shut down by `SourceAdapter::shutdown`
//! (or on drop) whatever way the run ends.

use crate::config::{ClientConfig, SourceConfig};
use crate::extract::{extract_browser_cell, split_items, ExtractError, Extraction};
use crate::source::throttle::{backoff_delay, Throttle};
use crate::source::{FetchFailure, RawItem, RawPage, SourceAdapter};
use crate::ConfigError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// Server name cell in the rendered list table
const SERVER_CELL: &str = "td.css-1su1bxu";

/// Slack added on top of the render wait before the process is killed
const RENDER_GRACE: Duration = Duration::from_secs(20);

/// A headless engine that turns a URL into rendered markup
#[async_trait]
pub trait RenderEngine: Send {
    /// Prepares the engine; called before the first render
    async fn start(&mut self) -> Result<(), String>;

    /// Returns the DOM of `url` after scripts have run
    async fn render(&mut self, url: &Url) -> Result<String, String>;

    /// Releases every resource held by the engine; must be idempotent
    async fn shutdown(&mut self);
}

/// Headless Chromium driven through `--dump-dom`
pub struct ChromeEngine {
    binary: String,
    user_agent: String,
    render_wait: Duration,
    executable: Option<PathBuf>,
    profile: Option<TempDir>,
}

impl ChromeEngine {
    pub fn new(binary: impl Into<String>, user_agent: impl Into<String>, render_wait: Duration) -> Self {
        Self {
            binary: binary.into(),
            user_agent: user_agent.into(),
            render_wait,
            executable: None,
            profile: None,
        }
    }

    pub fn from_config(source: &SourceConfig, client: &ClientConfig) -> Result<Self, ConfigError> {
        let binary = source.browser_binary.clone().ok_or_else(|| {
            ConfigError::Validation(format!(
                "source '{}': browser sources need browser-binary",
                source.name
            ))
        })?;
        Ok(Self::new(
            binary,
            client.user_agent.clone(),
            Duration::from_millis(source.render_wait_ms),
        ))
    }

    fn args(&self, profile: &TempDir, url: &Url) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--window-size=1920,1080".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-data-dir={}", profile.path().display()),
            format!("--user-agent={}", self.user_agent),
            format!("--virtual-time-budget={}", self.render_wait.as_millis()),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn start(&mut self) -> Result<(), String> {
        if self.executable.is_some() {
            return Ok(());
        }

        let executable = which::which(&self.binary)
            .map_err(|e| format!("browser '{}' not found: {}", self.binary, e))?;
        let profile = tempfile::Builder::new()
            .prefix("wipe-ledger-profile-")
            .tempdir()
            .map_err(|e| format!("cannot create browser profile: {}", e))?;

        info!("Starting browser {} with profile {}", executable.display(), profile.path().display());
        self.executable = Some(executable);
        self.profile = Some(profile);
        Ok(())
    }

    async fn render(&mut self, url: &Url) -> Result<String, String> {
        let (Some(executable), Some(profile)) = (&self.executable, &self.profile) else {
            return Err("browser not started".to_string());
        };

        let child = Command::new(executable)
            .args(self.args(profile, url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.render_wait + RENDER_GRACE, child)
            .await
            .map_err(|_| "browser timed out".to_string())?
            .map_err(|e| format!("cannot run browser: {}", e))?;

        if !output.status.success() {
            return Err(format!(
                "browser exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shutdown(&mut self) {
        self.executable = None;
        if let Some(profile) = self.profile.take() {
            let path = profile.path().display().to_string();
            match profile.close() {
                Ok(()) => debug!("Removed browser profile {}", path),
                Err(e) => warn!("Failed to remove browser profile {}: {}", path, e),
            }
        }
    }
}

/// BattleMetrics website listing, newest servers first
pub struct BrowserAdapter<E: RenderEngine = ChromeEngine> {
    config: SourceConfig,
    engine: E,
    throttle: Throttle,
    base_url: Url,
    started: bool,
}

impl<E: RenderEngine> BrowserAdapter<E> {
    pub fn new(config: SourceConfig, engine: E) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let throttle = Throttle::new(config.delay_min_ms, config.delay_max_ms);

        Ok(Self {
            config,
            engine,
            throttle,
            base_url,
            started: false,
        })
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("sort", "-details.rust_born")
            .append_pair("page", &page.to_string());
        url
    }

    async fn render_with_retry(&mut self, url: &Url) -> Result<String, FetchFailure> {
        let attempts = self.config.max_attempts.max(1);
        let backoff = Duration::from_millis(self.config.backoff_base_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.throttle.acquire().await;
            match self.engine.render(url).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    warn!("{}: render attempt {}/{} failed: {}", self.config.name, attempt, attempts, e);
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff_delay(backoff, attempt)).await;
            }
        }

        Err(FetchFailure::Render {
            url: url.to_string(),
            message: last_error,
        })
    }
}

#[async_trait]
impl<E: RenderEngine> SourceAdapter for BrowserAdapter<E> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn settings(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch_page(&mut self, page: u32) -> Result<RawPage, FetchFailure> {
        let url = self.page_url(page);

        if !self.started {
            self.engine.start().await.map_err(|message| FetchFailure::Render {
                url: url.to_string(),
                message,
            })?;
            self.started = true;
        }

        let html = self.render_with_retry(&url).await?;
        let cells = split_items(&html, SERVER_CELL).map_err(|e| FetchFailure::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("{}: page {} rendered {} servers", self.config.name, page, cells.len());
        Ok(RawPage::new(page, cells.into_iter().map(RawItem::Html).collect()))
    }

    fn extract(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Extraction {
        match item {
            RawItem::Html(fragment) => extract_browser_cell(fragment, observed_at),
            RawItem::Json(_) | RawItem::Detail { .. } => {
                Extraction::Malformed(ExtractError::Markup("expected a table cell".to_string()))
            }
        }
    }

    /// The site reshuffles across pages, so repeats always end the run
    fn dedupe_within_run(&self) -> bool {
        true
    }

    async fn shutdown(&mut self) {
        if self.started {
            self.engine.shutdown().await;
            self.started = false;
            info!("{}: browser shut down", self.config.name);
        }
    }
}
