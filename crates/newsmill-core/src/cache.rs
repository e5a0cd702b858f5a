use crate::error::{AppError, Result};
use crate::models::Article;
use crate::store::KvStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// What gets persisted under the cache key: the full article set and the
/// time it was written, in Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEnvelope {
    pub articles: Vec<Article>,
    pub timestamp: i64,
}

impl CacheEnvelope {
    pub fn new(articles: Vec<Article>, now: DateTime<Utc>) -> Self {
        Self {
            articles,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Fresh when written no more than `window` ago. A timestamp in the
    /// future is treated as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age = now.timestamp_millis() - self.timestamp;
        (0..=window.num_milliseconds()).contains(&age)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(CacheEnvelope),
    Stale(CacheEnvelope),
    Missing,
}

/// Read and classify the persisted envelope. Unreadable or corrupt entries
/// are logged and reported as [`CacheLookup::Missing`].
pub fn read_envelope(
    store: &dyn KvStore,
    key: &str,
    now: DateTime<Utc>,
    freshness: Duration,
) -> CacheLookup {
    let raw = match store.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return CacheLookup::Missing,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read cache");
            return CacheLookup::Missing;
        }
    };

    match decode(&raw) {
        Ok(envelope) if envelope.is_fresh(now, freshness) => CacheLookup::Fresh(envelope),
        Ok(envelope) => CacheLookup::Stale(envelope),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring corrupt cache entry");
            CacheLookup::Missing
        }
    }
}

fn decode(raw: &str) -> Result<CacheEnvelope> {
    serde_json::from_str(raw).map_err(|e| AppError::CacheCorrupt(e.to_string()))
}

pub fn write_envelope(store: &dyn KvStore, key: &str, envelope: &CacheEnvelope) -> Result<()> {
    let json = serde_json::to_string(envelope)?;
    store.write(key, &json)
}

#[derive(Deserialize)]
struct Snapshot {
    articles: Vec<Article>,
}

/// Load the static fallback snapshot: a JSON object with an `articles` array.
pub async fn load_snapshot(path: &Path) -> Result<Vec<Article>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    info!(path = %path.display(), count = snapshot.articles.len(), "Loaded fallback snapshot");
    Ok(snapshot.articles)
}

/// Write `articles` in the snapshot format [`load_snapshot`] reads.
pub async fn write_snapshot(path: &Path, articles: &[Article]) -> Result<()> {
    let envelope = CacheEnvelope::new(articles.to_vec(), Utc::now());
    let json = serde_json::to_string_pretty(&envelope)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), count = articles.len(), "Wrote snapshot");
    Ok(())
}
