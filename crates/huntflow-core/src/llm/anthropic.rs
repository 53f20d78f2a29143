use super::{LlmClient, LlmSettings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl AnthropicClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("Anthropic API key must be provided via ANTHROPIC_API_KEY or llm.api_key_env");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com".to_string());
        let url = format!("{}/v1/messages", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent(concat!("huntflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let payload = AnthropicRequest {
            model,
            system: SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self
                .http
                .post(&self.url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err).context("failed to call Anthropic messages API");
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                    continue;
                }
            };

            if !response.status().is_success() {
                if attempt >= self.max_retries {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("Anthropic API error ({}): {}", status, body);
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            let message: AnthropicResponse = response
                .json()
                .await
                .context("failed to parse Anthropic response")?;
            let text: Vec<String> = message
                .content
                .into_iter()
                .filter_map(|part| part.text)
                .collect();
            if text.is_empty() {
                return Err(anyhow!("Anthropic response missing message content"));
            }
            return Ok(text.join("\n"));
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a security assistant supporting an authorized bug bounty engagement. Answer with concise, actionable testing suggestions.";

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'static str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}
