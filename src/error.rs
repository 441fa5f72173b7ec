use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `ReadBot`.
///
/// Each subsystem defines its own error type. The coordinator matches on them
/// to build the reason strings it sends back to the UI; the binary uses
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ReadBotError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Cache ───────────────────────────────────────────────────────────
    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    // ── Extraction ──────────────────────────────────────────────────────
    #[error("extraction: {0}")]
    Extraction(#[from] ExtractionError),

    // ── LLM / Provider ──────────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Inbound request ─────────────────────────────────────────────────
    #[error("Unknown message type: {0}")]
    UnknownRequest(String),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to save config: {0}")]
    Save(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Cache errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("URL is empty")]
    EmptyUrl,

    #[error("storage: {0}")]
    Storage(String),

    #[error("corrupt entry {key}: {message}")]
    Codec { key: String, message: String },
}

impl From<sqlx::Error> for CacheError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

// ─── Extraction errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// No API key or endpoint configured for the selected method.
    #[error("{0}")]
    MissingCredential(String),

    /// Page markup could not be obtained (page still loading).
    #[error("page_loading")]
    PageNotReady,

    #[error("{0}")]
    ExtractionFailed(String),

    #[error("transport: {0}")]
    Transport(String),
}

impl ExtractionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExtractionFailed(message.into())
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingCredential(message.into())
    }
}

// ─── LLM / Provider errors ──────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("{provider} API key is required")]
    MissingApiKey { provider: String },

    #[error("{provider} API error ({status}): {message}")]
    Status {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned no response text")]
    EmptyResponse { provider: String },

    #[error("invalid image attachment: {0}")]
    InvalidImage(String),
}
