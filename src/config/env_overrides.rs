use super::Config;
use crate::llm::ProviderKind;

impl Config {
    /// Apply `READBOT_*` overrides; `lookup` resolves a variable name.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(provider) = var("READBOT_PROVIDER")
            && let Ok(kind) = provider.parse::<ProviderKind>()
        {
            self.llm.default_provider = kind;
        }
        if let Some(key) = var("READBOT_API_KEY") {
            match self.llm.default_provider {
                ProviderKind::OpenAi => self.llm.providers.openai.api_key = key,
                ProviderKind::Gemini => self.llm.providers.gemini.api_key = key,
            }
        }
        if let Some(model) = var("READBOT_MODEL") {
            match self.llm.default_provider {
                ProviderKind::OpenAi => self.llm.providers.openai.model = model,
                ProviderKind::Gemini => self.llm.providers.gemini.model = model,
            }
        }
        if let Some(key) = var("READBOT_JINA_API_KEY") {
            self.jina_api_key = key;
        }
        if let Some(port_str) = var("READBOT_GATEWAY_PORT")
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Some(host) = var("READBOT_GATEWAY_HOST") {
            self.gateway.host = host;
        }
    }
}
