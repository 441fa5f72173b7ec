use super::Config;
use crate::error::ConfigError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ConfigError>> + Send + 'a>>;

/// Access to the synchronized configuration blob.
pub trait ConfigStore: Send + Sync {
    /// Effective configuration, environment overrides included.
    fn load(&self) -> StoreFuture<'_, Config>;

    /// Configuration as persisted, without environment overrides. Updates
    /// merge over this so overrides never end up on disk.
    fn load_stored(&self) -> StoreFuture<'_, Config> {
        self.load()
    }

    fn save<'a>(&'a self, config: &'a Config) -> StoreFuture<'a, ()>;

    /// Overwrite the stored configuration with the defaults.
    fn reset(&self) -> StoreFuture<'_, ()>;
}

/// `config.toml` on disk, re-read on every load so edits made by the
/// options UI or by hand are picked up without a restart.
pub struct FileConfigStore {
    dir: PathBuf,
    env: EnvLookup,
}

/// Resolves `READBOT_*` variable names to values.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

impl FileConfigStore {
    /// Store in `dir` with overrides from the process environment.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_env(dir, Arc::new(|key: &str| std::env::var(key).ok()))
    }

    pub fn with_env(dir: impl Into<PathBuf>, env: EnvLookup) -> Self {
        Self {
            dir: dir.into(),
            env,
        }
    }

    fn blocking_load(dir: &Path, env: Option<&EnvLookup>) -> Result<Config, ConfigError> {
        let mut config =
            Config::load_or_init_in(dir).map_err(|e| ConfigError::Load(format!("{e:#}")))?;
        if let Some(env) = env {
            config.apply_env_overrides(env.as_ref());
        }
        Ok(config)
    }

    fn read(&self, with_env: bool) -> StoreFuture<'_, Config> {
        Box::pin(async move {
            let dir = self.dir.clone();
            let env = with_env.then(|| Arc::clone(&self.env));
            tokio::task::spawn_blocking(move || Self::blocking_load(&dir, env.as_ref()))
                .await
                .map_err(|e| ConfigError::Load(e.to_string()))?
        })
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> StoreFuture<'_, Config> {
        self.read(true)
    }

    fn load_stored(&self) -> StoreFuture<'_, Config> {
        self.read(false)
    }

    fn save<'a>(&'a self, config: &'a Config) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if !self.dir.exists() {
                tokio::fs::create_dir_all(&self.dir).await?;
            }
            let toml_str =
                toml::to_string_pretty(config).map_err(|e| ConfigError::Save(e.to_string()))?;
            tokio::fs::write(self.dir.join("config.toml"), toml_str).await?;
            tracing::debug!(dir = %self.dir.display(), "config saved");
            Ok(())
        })
    }

    fn reset(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let defaults = Config::default();
            self.save(&defaults).await
        })
    }
}

/// In-process configuration, used by tests and one-shot CLI runs.
pub struct MemoryConfigStore {
    inner: RwLock<Config>,
}

impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> StoreFuture<'_, Config> {
        Box::pin(async move { Ok(self.inner.read().await.clone()) })
    }

    fn save<'a>(&'a self, config: &'a Config) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            *self.inner.write().await = config.clone();
            Ok(())
        })
    }

    fn reset(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            *self.inner.write().await = Config::default();
            Ok(())
        })
    }
}
