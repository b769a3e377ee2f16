use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Wipe-Ledger
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    pub store: StoreConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by its configured name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// HTTP client identity and timeouts shared by all sources
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// User-Agent presented to every source
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

/// Store and side-output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Where the list of already-known server names is written after a run
    #[serde(rename = "export-path", default)]
    pub export_path: Option<String>,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// Which adapter implementation serves a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// BattleMetrics JSON REST API
    BattlemetricsApi,
    /// Just-Wiped HTML listing (recent or upcoming wipes)
    JustWiped,
    /// Just-Wiped server detail pages linked from a listing
    JustWipedDetails,
    /// BattleMetrics website rendered through a headless browser
    BattlemetricsBrowser,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BattlemetricsApi => "battlemetrics-api",
            Self::JustWiped => "just-wiped",
            Self::JustWipedDetails => "just-wiped-details",
            Self::BattlemetricsBrowser => "battlemetrics-browser",
        }
    }
}

/// Per-source fetch, pagination and extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique name used in logs, reports and `--source`
    pub name: String,

    pub kind: SourceKind,

    /// Listing or API endpoint; pagination parameters are appended
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Items on a full page; a shorter page ends pagination
    #[serde(rename = "page-size", default)]
    pub page_size: Option<usize>,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Lower bound of the delay between calls to this source (milliseconds)
    #[serde(rename = "delay-min-ms", default = "default_delay_ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the delay between calls to this source (milliseconds)
    #[serde(rename = "delay-max-ms", default = "default_delay_ms")]
    pub delay_max_ms: u64,

    /// Total attempts per request, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Append a random `nocache` query token to every request
    #[serde(rename = "cache-bust", default)]
    pub cache_bust: bool,

    /// Stop when a page holds only servers already seen in this run
    #[serde(rename = "dedupe-within-run", default)]
    pub dedupe_within_run: bool,

    /// Minimum listing rating (percent) a server needs to be ingested
    #[serde(rename = "min-rating", default)]
    pub min_rating: Option<u8>,

    /// Candidates carry the observed wipe instant and may repair placeholders
    #[serde(rename = "carries-wipe-instant", default)]
    pub carries_wipe_instant: bool,

    /// Environment variable holding a bearer token for this source
    #[serde(rename = "api-key-env", default)]
    pub api_key_env: Option<String>,

    /// Headless browser executable (name on PATH or absolute path)
    #[serde(rename = "browser-binary", default)]
    pub browser_binary: Option<String>,

    /// Virtual time budget given to the page before the DOM is dumped
    #[serde(rename = "render-wait-ms", default = "default_render_wait_ms")]
    pub render_wait_ms: u64,

    /// CSS selector of one listing entry; unset splits on detail links
    #[serde(rename = "entry-selector", default)]
    pub entry_selector: Option<String>,

    /// Extra request headers presented to this source
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_max_pages() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_render_wait_ms() -> u64 {
    5000
}
