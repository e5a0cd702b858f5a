//! Owns the canonical article set.
//!
//! Lifecycle: `ColdStart` → `CacheFresh` | `CacheStaleOrMissing` → `Ready`.
//! Every change to the set goes through the private commit step; the rest of
//! the pipeline only produces values.

use crate::cache::{load_snapshot, read_envelope, write_envelope, CacheEnvelope, CacheLookup};
use crate::config::Settings;
use crate::dedup;
use crate::error::{AppError, Result};
use crate::feeds::load_feeds;
use crate::filter::unique_sources;
use crate::image::is_placeholder;
use crate::models::{Article, SourceInfo};
use crate::ogp::scrape_in_batches;
use crate::proxy::{build_client, ProxyFetcher};
use crate::store::KvStore;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const UNAVAILABLE_MESSAGE: &str =
    "News could not be loaded. Check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    ColdStart,
    CacheFresh,
    CacheStaleOrMissing,
    Ready,
}

/// Where the articles returned by [`Aggregator::initial_load`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Live,
    FreshCache,
    StaleCache,
    FallbackSnapshot,
}

#[derive(Debug, Clone)]
pub struct InitialLoad {
    pub articles: Vec<Article>,
    pub origin: SnapshotOrigin,
    /// The caller should start [`Aggregator::spawn_refresh`].
    pub refresh_in_background: bool,
}

struct Inner {
    articles: Vec<Article>,
    state: FeedState,
}

pub struct Aggregator {
    feed_fetcher: ProxyFetcher,
    page_fetcher: ProxyFetcher,
    store: Arc<dyn KvStore>,
    settings: Settings,
    inner: RwLock<Inner>,
    refreshing: Mutex<()>,
}

impl Aggregator {
    pub fn new(settings: Settings, store: Arc<dyn KvStore>) -> Result<Self> {
        let client = build_client()?;
        let feed_fetcher = ProxyFetcher::new(
            client.clone(),
            settings.proxies.feed.clone(),
            settings.proxies.feed_timeout(),
        );
        let page_fetcher = ProxyFetcher::new(
            client,
            settings.proxies.page.clone(),
            settings.proxies.page_timeout(),
        );
        Ok(Self {
            feed_fetcher,
            page_fetcher,
            store,
            settings,
            inner: RwLock::new(Inner {
                articles: Vec::new(),
                state: FeedState::ColdStart,
            }),
            refreshing: Mutex::new(()),
        })
    }

    /// Serve a fresh cache immediately, otherwise block on a live refresh.
    ///
    /// When the refresh fails, a stale cache is served, then the static
    /// fallback snapshot. [`AppError::Unavailable`] only when all of those
    /// are missing.
    pub async fn initial_load(&self) -> Result<InitialLoad> {
        let cache = &self.settings.cache;
        let lookup = read_envelope(self.store.as_ref(), &cache.key, Utc::now(), cache.freshness());

        let stale = match lookup {
            CacheLookup::Fresh(envelope) => {
                info!(count = envelope.articles.len(), "Serving fresh cache");
                let articles = self.commit(envelope.articles, false, FeedState::CacheFresh).await;
                return Ok(InitialLoad {
                    articles,
                    origin: SnapshotOrigin::FreshCache,
                    refresh_in_background: true,
                });
            }
            CacheLookup::Stale(envelope) => {
                info!(count = envelope.articles.len(), "Cache is stale, refreshing");
                Some(envelope)
            }
            CacheLookup::Missing => {
                info!("No cache, refreshing");
                None
            }
        };

        // Stale articles seed the set so the refresh merges on top of them.
        let seed = stale.map(|e| e.articles).unwrap_or_default();
        let had_stale = !seed.is_empty();
        self.commit(seed, false, FeedState::CacheStaleOrMissing).await;

        match self.refresh().await {
            Ok(articles) => Ok(InitialLoad {
                articles,
                origin: SnapshotOrigin::Live,
                refresh_in_background: false,
            }),
            Err(e) => {
                warn!(error = %e, "Live refresh failed, trying fallbacks");
                self.serve_fallback(had_stale).await
            }
        }
    }

    async fn serve_fallback(&self, had_stale: bool) -> Result<InitialLoad> {
        if had_stale {
            let articles = self.commit(self.articles().await, false, FeedState::Ready).await;
            warn!(count = articles.len(), "Serving stale cache");
            return Ok(InitialLoad {
                articles,
                origin: SnapshotOrigin::StaleCache,
                refresh_in_background: false,
            });
        }

        if let Some(path) = &self.settings.cache.fallback_snapshot {
            match load_snapshot(path).await {
                Ok(snapshot) => {
                    let articles = self.commit(snapshot, false, FeedState::Ready).await;
                    warn!(count = articles.len(), "Serving fallback snapshot");
                    return Ok(InitialLoad {
                        articles,
                        origin: SnapshotOrigin::FallbackSnapshot,
                        refresh_in_background: false,
                    });
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Fallback snapshot unavailable"),
            }
        }

        Err(AppError::Unavailable(UNAVAILABLE_MESSAGE.into()))
    }

    /// Fetch the primary group, then the secondary one, merging after each
    /// success. Groups without feeds are skipped. Fails with
    /// [`AppError::AggregationExhausted`] when no group delivered, in which
    /// case nothing is persisted. A refresh requested while another is
    /// running is skipped and returns the current set.
    pub async fn refresh(&self) -> Result<Vec<Article>> {
        let Ok(_guard) = self.refreshing.try_lock() else {
            info!("Refresh already in progress, skipping");
            return Ok(self.articles().await);
        };

        let summary_len = self.settings.content.summary_max_len;
        let mut any_succeeded = false;
        let mut last_error = None;

        for group in self.settings.feeds.groups() {
            if group.sources.is_empty() {
                continue;
            }
            match load_feeds(&self.feed_fetcher, &group, summary_len).await {
                Ok(incoming) => {
                    any_succeeded = true;
                    let merged = self.absorb(incoming).await;
                    info!(group = %group.name, total = merged.len(), "Merged feed group");
                }
                Err(e) => {
                    warn!(group = %group.name, error = %e, "Feed group failed");
                    last_error = Some(e);
                }
            }
        }

        if any_succeeded {
            return Ok(self.articles().await);
        }
        Err(last_error.unwrap_or_else(|| AppError::AggregationExhausted {
            group: "all".into(),
        }))
    }

    /// Run [`Aggregator::refresh`] on a Tokio task.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.refresh().await {
                Ok(articles) => info!(count = articles.len(), "Background refresh complete"),
                Err(e) => warn!(error = %e, "Background refresh failed"),
            }
        })
    }

    /// Dedupe `incoming` over `existing` (incoming wins), prune, sort, persist
    /// and commit.
    pub async fn merge_and_persist(&self, existing: Vec<Article>, incoming: Vec<Article>) -> Vec<Article> {
        let merged = dedup::merge(existing, incoming, Utc::now(), self.settings.cache.retention());
        self.commit(merged, true, FeedState::Ready).await
    }

    /// Merge into whatever is committed right now. Read, merge and commit
    /// happen under one write guard so concurrent callers cannot drop each
    /// other's articles.
    async fn absorb(&self, incoming: Vec<Article>) -> Vec<Article> {
        let mut inner = self.inner.write().await;
        let existing = std::mem::take(&mut inner.articles);
        let merged = dedup::merge(existing, incoming, Utc::now(), self.settings.cache.retention());
        self.commit_locked(&mut inner, merged, true, FeedState::Ready)
    }

    async fn commit(&self, articles: Vec<Article>, persist: bool, state: FeedState) -> Vec<Article> {
        let mut inner = self.inner.write().await;
        self.commit_locked(&mut inner, articles, persist, state)
    }

    /// Replace the canonical set. With `persist`, the envelope is written first;
    /// a failed write is logged and the in-memory set is still updated. Once
    /// `Ready`, the state stays `Ready`.
    fn commit_locked(
        &self,
        inner: &mut Inner,
        articles: Vec<Article>,
        persist: bool,
        state: FeedState,
    ) -> Vec<Article> {
        if persist {
            let envelope = CacheEnvelope::new(articles, Utc::now());
            if let Err(e) = write_envelope(self.store.as_ref(), &self.settings.cache.key, &envelope) {
                warn!(error = %e, "Failed to persist cache");
            }
            inner.articles = envelope.articles;
        } else {
            inner.articles = articles;
        }
        if inner.state != FeedState::Ready {
            inner.state = state;
        }
        inner.articles.clone()
    }

    /// Scrape preview images for articles that still need one and merge the
    /// improved copies back. Returns how many were improved.
    pub async fn enrich_images(&self) -> usize {
        let scraping = &self.settings.scraping;
        let candidates: Vec<Article> = self
            .inner
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.needs_scraping || is_placeholder(&a.image_url))
            .take(scraping.max_articles)
            .cloned()
            .collect();

        if candidates.is_empty() {
            return 0;
        }

        let improved = scrape_in_batches(
            &self.page_fetcher,
            &candidates,
            scraping.batch_size,
            scraping.batch_pause(),
        )
        .await;

        let count = improved.len();
        if count > 0 {
            self.absorb(improved).await;
        }
        count
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.inner.read().await.articles.clone()
    }

    pub async fn sources(&self) -> Vec<SourceInfo> {
        unique_sources(&self.inner.read().await.articles)
    }

    pub async fn available_ids(&self) -> HashSet<String> {
        self.inner
            .read()
            .await
            .articles
            .iter()
            .map(|a| a.id.clone())
            .collect()
    }

    pub async fn state(&self) -> FeedState {
        self.inner.read().await.state
    }
}
