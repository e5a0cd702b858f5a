use crate::error::{AppError, Result};
use crate::models::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration compiled into the binary.
pub const FEEDS_TOML: &str = include_str!("../../../feeds.toml");

/// Static pairing of a feed URL with its language.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FeedSource {
    pub url: String,
    pub language: Language,
}

/// A named batch of feeds fetched together.
#[derive(Debug, Clone)]
pub struct FeedGroup {
    pub name: String,
    pub sources: Vec<FeedSource>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeedGroups {
    #[serde(default)]
    pub primary: Vec<FeedSource>,
    #[serde(default)]
    pub secondary: Vec<FeedSource>,
}

impl FeedGroups {
    /// Groups in fetch order: primary first.
    pub fn groups(&self) -> Vec<FeedGroup> {
        vec![
            FeedGroup {
                name: "primary".into(),
                sources: self.primary.clone(),
            },
            FeedGroup {
                name: "secondary".into(),
                sources: self.secondary.clone(),
            },
        ]
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    /// Templates for feed downloads. `{url}` is replaced with the encoded target.
    #[serde(default = "default_feed_proxies")]
    pub feed: Vec<String>,
    /// Shorter list used for article pages (OG image scraping).
    #[serde(default = "default_page_proxies")]
    pub page: Vec<String>,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
}

fn default_feed_proxies() -> Vec<String> {
    vec![
        "https://api.codetabs.com/v1/proxy?quest={url}".into(),
        "https://corsproxy.io/?{url}".into(),
        "https://api.allorigins.win/raw?url={url}".into(),
    ]
}

fn default_page_proxies() -> Vec<String> {
    vec![
        "https://corsproxy.io/?{url}".into(),
        "https://api.allorigins.win/raw?url={url}".into(),
    ]
}

fn default_feed_timeout() -> u64 {
    8
}

fn default_page_timeout() -> u64 {
    5
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            feed: default_feed_proxies(),
            page: default_page_proxies(),
            feed_timeout_secs: default_feed_timeout(),
            page_timeout_secs: default_page_timeout(),
        }
    }
}

impl ProxySettings {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_cache_key")]
    pub key: String,
    #[serde(default = "default_freshness")]
    pub freshness_secs: i64,
    #[serde(default = "default_retention")]
    pub retention_days: i64,
    /// Static last-resort snapshot (`news-cache.json`).
    #[serde(default)]
    pub fallback_snapshot: Option<PathBuf>,
}

fn default_cache_key() -> String {
    "news-cache".into()
}

fn default_freshness() -> i64 {
    300
}

fn default_retention() -> i64 {
    7
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            freshness_secs: default_freshness(),
            retention_days: default_retention(),
            fallback_snapshot: None,
        }
    }
}

impl CacheSettings {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause")]
    pub batch_pause_ms: u64,
    /// Upper bound of pages scraped per enrichment pass.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
}

fn default_batch_size() -> usize {
    3
}

fn default_batch_pause() -> u64 {
    1000
}

fn default_max_articles() -> usize {
    30
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause(),
            max_articles: default_max_articles(),
        }
    }
}

impl ScrapeSettings {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentSettings {
    #[serde(default = "default_summary_len")]
    pub summary_max_len: usize,
}

fn default_summary_len() -> usize {
    crate::summary::DEFAULT_SUMMARY_LEN
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            summary_max_len: default_summary_len(),
        }
    }
}

/// Full pipeline configuration, loaded from TOML.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub feeds: FeedGroups,
    #[serde(default)]
    pub proxies: ProxySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub scraping: ScrapeSettings,
    #[serde(default)]
    pub content: ContentSettings,
}

impl Settings {
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(toml_str).map_err(|e| AppError::ConfigError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The configuration shipped in `feeds.toml`.
    pub fn embedded() -> Result<Self> {
        Self::from_toml(FEEDS_TOML)
    }

    fn validate(&self) -> Result<()> {
        for (kind, list) in [("feed", &self.proxies.feed), ("page", &self.proxies.page)] {
            if list.is_empty() {
                return Err(AppError::ConfigError(format!("No {kind} proxies configured")));
            }
            if let Some(bad) = list.iter().find(|t| !t.contains("{url}")) {
                return Err(AppError::ConfigError(format!(
                    "Proxy template without {{url}} placeholder: {bad}"
                )));
            }
        }
        if self.scraping.batch_size == 0 {
            return Err(AppError::ConfigError("scraping.batch_size must be positive".into()));
        }
        if self.content.summary_max_len == 0 {
            return Err(AppError::ConfigError(
                "content.summary_max_len must be positive".into(),
            ));
        }
        Ok(())
    }
}
