mod env_overrides;
mod loader;
pub mod store;
mod types;

pub use store::{ConfigStore, EnvLookup, FileConfigStore, MemoryConfigStore};
pub use types::{
    CacheConfig, Config, GatewayConfig, GeminiSettings, LlmConfig, MarkupConfig, OpenAiSettings,
    ProvidersConfig, QuickInput,
};
