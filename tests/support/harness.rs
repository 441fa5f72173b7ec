#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use readbot::cache::{KvStore, PageCache, SqliteKvStore};
use readbot::config::{Config, ConfigStore, FileConfigStore};
use readbot::coordinator::{Coordinator, StaticMarkupSource};
use readbot::extract::ExtractionRouter;
use readbot::http_client::build_http_client;
use readbot::llm::LlmClient;

pub const ARTICLE_URL: &str = "https://blog.example.com/posts/rust";

pub const ARTICLE_HTML: &str = r#"<html>
<head><title>Why Rust</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <article>
    <h1>Why Rust</h1>
    <p>Rust gives you memory safety without a garbage collector, and it does so at compile time.</p>
    <p>Ownership, borrowing, and lifetimes are the core ideas.</p>
  </article>
  <footer>Copyright</footer>
</body>
</html>"#;

/// Coordinator over an on-disk config directory and SQLite cache.
pub struct Workspace {
    pub dir: TempDir,
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<dyn ConfigStore>,
}

impl Workspace {
    pub async fn new(markup: StaticMarkupSource) -> Self {
        Self::with_config(Config::default(), markup).await
    }

    pub async fn with_config(config: Config, markup: StaticMarkupSource) -> Self {
        let dir = TempDir::new().unwrap();
        // Empty environment, so READBOT_* variables of the test process
        // never leak into the workspace.
        let store = FileConfigStore::with_env(dir.path(), Arc::new(|_: &str| None));
        store.save(&config).await.unwrap();
        let config_store: Arc<dyn ConfigStore> = Arc::new(store);

        let coordinator = build_coordinator(&dir, &config, &config_store, markup).await;
        Self {
            dir,
            coordinator,
            config: config_store,
        }
    }

    /// A second coordinator over the same files, as after a restart.
    pub async fn reopen(&self) -> Arc<Coordinator> {
        let config = self.config.load().await.unwrap();
        build_coordinator(&self.dir, &config, &self.config, StaticMarkupSource::new()).await
    }
}

async fn build_coordinator(
    dir: &TempDir,
    config: &Config,
    config_store: &Arc<dyn ConfigStore>,
    markup: StaticMarkupSource,
) -> Arc<Coordinator> {
    let kv: Arc<dyn KvStore> =
        Arc::new(SqliteKvStore::open(&dir.path().join("cache.db")).await.unwrap());
    let client = build_http_client();
    Arc::new(Coordinator::new(
        Arc::new(PageCache::new(kv, config.cache.max_entries)),
        Arc::new(ExtractionRouter::with_defaults(client.clone())),
        Arc::new(LlmClient::new(client)),
        Arc::clone(config_store),
        Arc::new(markup),
    ))
}
