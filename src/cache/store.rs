use crate::error::CacheError;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

pub type KvFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Per-device string key-value namespace backing the page cache.
pub trait KvStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> KvFuture<'a, ()>;

    /// Remove every listed key; absent keys are ignored.
    fn remove<'a>(&'a self, keys: &'a [String]) -> KvFuture<'a, ()>;

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> KvFuture<'a, Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl KvStore for MemoryKvStore {
    fn get<'a>(&'a self, key: &'a str) -> KvFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> KvFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, keys: &'a [String]) -> KvFuture<'a, ()> {
        Box::pin(async move {
            let mut guard = self.entries.write().await;
            for key in keys {
                guard.remove(key);
            }
            Ok(())
        })
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> KvFuture<'a, Vec<String>> {
        Box::pin(async move {
            Ok(self
                .entries
                .read()
                .await
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        })
    }
}
