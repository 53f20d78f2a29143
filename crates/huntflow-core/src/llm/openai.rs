use super::{LlmClient, LlmSettings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("OpenAI API key must be provided via OPENAI_API_KEY or llm.api_key_env");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent(concat!("huntflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let payload = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
        };

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err).context("failed to call OpenAI chat completions API");
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
                    bail!("OpenAI API error ({}): {}", status, body);
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            let chat: ChatCompletionResponse = response
                .json()
                .await
                .context("failed to parse OpenAI response")?;
            return chat
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("OpenAI response missing message content"));
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a security assistant supporting an authorized bug bounty engagement. Answer with concise, actionable testing suggestions.";

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderKind;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(endpoint: String, max_retries: u32) -> LlmSettings {
        LlmSettings {
            provider: ProviderKind::OpenAi,
            api_key: "test-key".into(),
            endpoint: Some(endpoint),
            timeout_secs: 5,
            max_retries,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn returns_first_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .body_contains("\"model\":\"gpt-3.5-turbo\"")
                    .body_contains("Recon for example.com");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "1. Check admin panel" } }
                    ]
                }));
            })
            .await;

        let client = OpenAiClient::new(&settings(server.base_url(), 0)).unwrap();
        let text = client
            .complete("gpt-3.5-turbo", "Recon for example.com")
            .await
            .expect("completion should succeed");
        assert_eq!(text, "1. Check admin panel");
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn surfaces_api_errors_without_retrying_by_default() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(404).body("model not found");
            })
            .await;

        let client = OpenAiClient::new(&settings(server.base_url(), 0)).unwrap();
        let err = client.complete("no-such-model", "prompt").await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("model not found"));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn retries_up_to_configured_limit() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(503);
            })
            .await;

        let client = OpenAiClient::new(&settings(server.base_url(), 2)).unwrap();
        assert!(client.complete("gpt-3.5-turbo", "prompt").await.is_err());
        mock.assert_hits_async(3).await;
    }

    #[test]
    fn requires_api_key() {
        let mut settings = settings("http://localhost".into(), 0);
        settings.api_key = " ".into();
        assert!(OpenAiClient::new(&settings).is_err());
    }
}
