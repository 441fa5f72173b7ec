use crate::extract::{ExtractionMethod, ExtractionSettings};
use crate::llm::{DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL, ProviderConfig, ProviderKind};
use crate::llm::openai::DEFAULT_BASE_URL as DEFAULT_OPENAI_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The synchronized configuration blob shared by the UI and the daemon.
///
/// Field names are the camelCase ones the extension's options page reads and
/// writes; snake_case aliases keep hand-written `config.toml` files valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Data directory holding the cache database - computed, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default, alias = "default_extraction_method")]
    pub default_extraction_method: ExtractionMethod,

    #[serde(default, alias = "jina_api_key")]
    pub jina_api_key: String,

    #[serde(default, alias = "download_api_endpoint")]
    pub download_api_endpoint: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default = "default_system_prompt", alias = "system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_quick_inputs", alias = "quick_inputs")]
    pub quick_inputs: Vec<QuickInput>,

    #[serde(
        default = "default_content_display_height",
        alias = "content_display_height"
    )]
    pub content_display_height: u32,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub markup: MarkupConfig,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. The user is interacting with content from a webpage. \
     The extracted content is provided below:\n{CONTENT}\n\n\
     Answer the user's questions based on this content and your general knowledge."
        .into()
}

fn default_quick_inputs() -> Vec<QuickInput> {
    vec![
        QuickInput {
            display_text: "Summarize".into(),
            send_text: "Please summarize the following content:\n{CONTENT}".into(),
        },
        QuickInput {
            display_text: "Key points".into(),
            send_text: "Extract key points from this content:\n{CONTENT}".into(),
        },
    ]
}

fn default_content_display_height() -> u32 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
            default_extraction_method: ExtractionMethod::default(),
            jina_api_key: String::new(),
            download_api_endpoint: String::new(),
            llm: LlmConfig::default(),
            system_prompt: default_system_prompt(),
            quick_inputs: default_quick_inputs(),
            content_display_height: default_content_display_height(),
            cache: CacheConfig::default(),
            gateway: GatewayConfig::default(),
            markup: MarkupConfig::default(),
        }
    }
}

impl Config {
    /// Settings for the currently selected LLM provider.
    pub fn provider_config(&self) -> ProviderConfig {
        match self.llm.default_provider {
            ProviderKind::OpenAi => {
                let openai = &self.llm.providers.openai;
                ProviderConfig {
                    provider: ProviderKind::OpenAi,
                    api_key: non_empty(&openai.api_key),
                    base_url: non_empty(&openai.base_url),
                    model: non_empty(&openai.model)
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                }
            }
            ProviderKind::Gemini => {
                let gemini = &self.llm.providers.gemini;
                ProviderConfig {
                    provider: ProviderKind::Gemini,
                    api_key: non_empty(&gemini.api_key),
                    base_url: None,
                    model: non_empty(&gemini.model)
                        .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                }
            }
        }
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            jina_api_key: non_empty(&self.jina_api_key),
            download_api_endpoint: non_empty(&self.download_api_endpoint),
        }
    }

    /// Location of the cache database.
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("cache.db"))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickInput {
    #[serde(alias = "display_text")]
    pub display_text: String,
    #[serde(alias = "send_text")]
    pub send_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default, alias = "default_provider")]
    pub default_provider: ProviderKind,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiSettings {
    #[serde(default, alias = "api_key")]
    pub api_key: String,
    #[serde(default = "default_openai_base_url", alias = "base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.into()
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSettings {
    #[serde(default, alias = "api_key")]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of cached pages (LRU capacity).
    #[serde(default = "default_cache_max_entries", alias = "max_entries")]
    pub max_entries: usize,
    /// Override for the SQLite file; defaults to `<data_dir>/cache.db`.
    #[serde(default, alias = "db_path")]
    pub db_path: Option<PathBuf>,
}

fn default_cache_max_entries() -> usize {
    20
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default, alias = "allow_public_bind")]
    pub allow_public_bind: bool,
    /// Allowed CORS origins; empty means any origin.
    #[serde(default, alias = "cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    7878
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            allow_public_bind: false,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupConfig {
    #[serde(default = "default_markup_timeout_secs", alias = "timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_markup_user_agent", alias = "user_agent")]
    pub user_agent: String,
}

fn default_markup_timeout_secs() -> u64 {
    10
}

fn default_markup_user_agent() -> String {
    "ReadBot/0.1".into()
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_markup_timeout_secs(),
            user_agent: default_markup_user_agent(),
        }
    }
}
