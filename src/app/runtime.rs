use crate::cache::{KvStore, PageCache, SqliteKvStore};
use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::coordinator::{Coordinator, HttpMarkupSource};
use crate::extract::ExtractionRouter;
use crate::http_client::build_http_client;
use crate::llm::LlmClient;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Everything one process needs, wired from the config directory.
pub struct Runtime {
    pub config: Config,
    pub config_store: Arc<dyn ConfigStore>,
    pub coordinator: Arc<Coordinator>,
}

impl Runtime {
    /// Load `config.toml` from `dir` (creating it on first run), open the
    /// cache database and build the coordinator.
    pub async fn open(dir: &Path) -> Result<Self> {
        let config_store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(dir));
        let config = config_store
            .load()
            .await
            .context("load configuration")?;

        let db_path = config.cache_db_path();
        let store: Arc<dyn KvStore> = Arc::new(
            SqliteKvStore::open(&db_path)
                .await
                .with_context(|| format!("open cache database {}", db_path.display()))?,
        );
        let cache = Arc::new(PageCache::new(store, config.cache.max_entries));

        let client = build_http_client();
        let markup = Arc::new(HttpMarkupSource::new(
            config.markup.timeout_secs,
            &config.markup.user_agent,
        ));
        let coordinator = Arc::new(Coordinator::new(
            cache,
            Arc::new(ExtractionRouter::with_defaults(client.clone())),
            Arc::new(LlmClient::new(client)),
            Arc::clone(&config_store),
            markup,
        ));

        tracing::debug!(dir = %dir.display(), db = %db_path.display(), "runtime ready");
        Ok(Self {
            config,
            config_store,
            coordinator,
        })
    }
}
