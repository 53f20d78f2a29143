mod anthropic;
mod openai;
mod settings;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use settings::LlmSettings;

/// Client abstraction for the model-query facility used by the analysis phase.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single formatted prompt to `model` and return the raw response text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Offline client that answers every prompt with a fixed notice.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

#[async_trait]
impl LlmClient for NoopLlmClient {
    async fn complete(&self, model: &str, _prompt: &str) -> Result<String> {
        Ok(format!(
            "LLM provider `noop` is configured; no suggestions were generated for model `{model}`."
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Noop,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "noop" => Ok(Self::Noop),
            other => bail!("unsupported LLM provider `{other}` (expected openai, anthropic or noop)"),
        }
    }

    pub fn default_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Noop => None,
        }
    }
}

/// Instantiate the client matching `settings.provider`.
pub fn build_client(settings: &LlmSettings) -> Result<Box<dyn LlmClient>> {
    Ok(match settings.provider {
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(settings)?),
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(settings)?),
        ProviderKind::Noop => Box::new(NoopLlmClient),
    })
}
