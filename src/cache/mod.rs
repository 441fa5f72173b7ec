//! Bounded per-URL page cache.
//!
//! Records live under `readBotCache_<normalized url>`; the recency index is a
//! JSON array under `readBotRecentUrls`, most recently used first. Every URL
//! with a live record appears exactly once in the index, and the index never
//! holds more than `capacity` URLs.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteKvStore;
pub use store::{KvStore, MemoryKvStore};

use crate::error::CacheError;
use crate::types::{ChatMessage, PageRecord};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const RECORD_KEY_PREFIX: &str = "readBotCache_";
pub const RECENT_URLS_KEY: &str = "readBotRecentUrls";
pub const DEFAULT_CAPACITY: usize = 20;

/// Trim and lower-case a URL so it can serve as a cache key.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

fn record_key(normalized: &str) -> String {
    format!("{RECORD_KEY_PREFIX}{normalized}")
}

pub struct PageCache {
    store: Arc<dyn KvStore>,
    capacity: usize,
    /// Held across every record write and its index update, so eviction
    /// never interleaves with another write.
    index_lock: Mutex<()>,
}

impl PageCache {
    pub fn new(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            index_lock: Mutex::new(()),
        }
    }

    /// Look up a record; a hit promotes the URL to most recently used.
    pub async fn get(&self, url: &str) -> Result<Option<PageRecord>, CacheError> {
        let normalized = checked_url(url)?;
        let _guard = self.index_lock.lock().await;

        let Some(record) = self.read_record(&normalized).await? else {
            return Ok(None);
        };
        if let Err(error) = self.promote_locked(&normalized).await {
            tracing::warn!(url = %normalized, %error, "failed to promote cache entry");
        }
        Ok(Some(record))
    }

    /// Write or overwrite a record, promote it, and evict beyond capacity.
    pub async fn put(&self, url: &str, record: &PageRecord) -> Result<(), CacheError> {
        let normalized = checked_url(url)?;
        let _guard = self.index_lock.lock().await;
        self.write_record(&normalized, record).await
    }

    /// Append chat turns to a page's history in one step. A page that is
    /// not cached (or whose entry is unreadable) starts from `content`.
    pub async fn append_chat(
        &self,
        url: &str,
        content: &str,
        turns: impl IntoIterator<Item = ChatMessage>,
    ) -> Result<(), CacheError> {
        let normalized = checked_url(url)?;
        let _guard = self.index_lock.lock().await;

        let mut record = match self.read_record(&normalized).await {
            Ok(Some(record)) => record,
            Ok(None) => PageRecord::new(content),
            Err(error @ CacheError::Codec { .. }) => {
                tracing::warn!(url = %normalized, %error, "replacing unreadable cache entry");
                PageRecord::new(content)
            }
            Err(error) => return Err(error),
        };
        record.chat_history.extend(turns);
        self.write_record(&normalized, &record).await
    }

    /// Delete a record and its index entry. Absent URLs are a no-op.
    pub async fn remove(&self, url: &str) -> Result<(), CacheError> {
        let normalized = checked_url(url)?;
        let _guard = self.index_lock.lock().await;

        self.store.remove(&[record_key(&normalized)]).await?;

        let mut recent = self.load_index().await?;
        let before = recent.len();
        recent.retain(|item| *item != normalized);
        if recent.len() != before {
            self.save_index(&recent).await?;
        }
        Ok(())
    }

    /// Delete every record and reset the index.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        let _guard = self.index_lock.lock().await;

        let mut keys = self.store.keys_with_prefix(RECORD_KEY_PREFIX).await?;
        keys.push(RECENT_URLS_KEY.to_string());
        self.store.remove(&keys).await?;

        tracing::debug!(removed = keys.len() - 1, "cache cleared");
        Ok(())
    }

    /// Snapshot of the recency index, most recently used first.
    pub async fn recent_urls(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.index_lock.lock().await;
        self.load_index().await
    }

    async fn read_record(&self, normalized: &str) -> Result<Option<PageRecord>, CacheError> {
        let key = record_key(normalized);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Codec {
                key,
                message: e.to_string(),
            })
    }

    /// Caller holds `index_lock`.
    async fn write_record(&self, normalized: &str, record: &PageRecord) -> Result<(), CacheError> {
        let key = record_key(normalized);
        let raw = serde_json::to_string(record).map_err(|e| CacheError::Codec {
            key: key.clone(),
            message: e.to_string(),
        })?;

        self.store.set(&key, raw).await?;

        if let Err(error) = self.promote_locked(normalized).await {
            // A record the index does not know about could never be evicted.
            if let Err(rollback) = self.store.remove(std::slice::from_ref(&key)).await {
                tracing::warn!(url = %normalized, %rollback, "failed to roll back cache write");
            }
            return Err(error);
        }
        Ok(())
    }

    /// Move `normalized` to the front and evict past capacity. Caller holds
    /// `index_lock`.
    async fn promote_locked(&self, normalized: &str) -> Result<(), CacheError> {
        let mut recent = self.load_index().await?;
        recent.retain(|item| item != normalized);
        recent.insert(0, normalized.to_string());

        if recent.len() > self.capacity {
            let evicted = recent.split_off(self.capacity);
            let keys: Vec<String> = evicted.iter().map(|url| record_key(url)).collect();
            self.store.remove(&keys).await?;
            tracing::debug!(evicted = ?evicted, "evicted least recently used pages");
        }

        self.save_index(&recent).await
    }

    async fn load_index(&self) -> Result<Vec<String>, CacheError> {
        let Some(raw) = self.store.get(RECENT_URLS_KEY).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| CacheError::Codec {
            key: RECENT_URLS_KEY.to_string(),
            message: e.to_string(),
        })
    }

    async fn save_index(&self, recent: &[String]) -> Result<(), CacheError> {
        let raw = serde_json::to_string(recent).map_err(|e| CacheError::Codec {
            key: RECENT_URLS_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(RECENT_URLS_KEY, raw).await
    }
}

fn checked_url(url: &str) -> Result<String, CacheError> {
    let normalized = normalize_url(url);
    if normalized.is_empty() {
        return Err(CacheError::EmptyUrl);
    }
    Ok(normalized)
}
