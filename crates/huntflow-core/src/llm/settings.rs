use anyhow::{Context, Result};
use std::collections::HashMap;

use super::ProviderKind;
use crate::config::LlmConfig;

/// Resolved provider configuration: the `llm` config section plus the API key from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmSettings {
    /// Resolve settings, reading the API key from the process environment.
    ///
    /// * `llm.provider`: `openai` (default), `anthropic` or `noop`.
    /// * `llm.api_key_env`: variable holding the key (default per provider,
    ///   e.g. `OPENAI_API_KEY`). Not required for `noop`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::from_map(config, std::env::vars().collect())
    }

    fn from_map(config: &LlmConfig, vars: HashMap<String, String>) -> Result<Self> {
        let provider = ProviderKind::parse(&config.provider)?;
        let key_var = config
            .api_key_env
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| provider.default_key_env().map(str::to_string));
        let api_key = match key_var {
            None => String::new(),
            Some(var) => vars
                .get(&var)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| {
                    format!(
                        "environment variable {} must be set when the {} provider is enabled",
                        var, config.provider
                    )
                })?,
        };
        let endpoint = config
            .endpoint
            .clone()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            provider,
            api_key,
            endpoint,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}
