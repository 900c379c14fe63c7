use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{LlmClient, RetryPolicy};
use super::InferenceError;

/// Public OpenRouter API base.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const CLIENT_TITLE: &str = "Substrate Replenishment Batch Processor";

/// OpenAI-compatible chat-completions client with bounded retries.
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    referer: Option<String>,
}

impl OpenRouterClient {
    /// `timeout` bounds each individual request; `None` keeps the HTTP client default.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Option<Duration>,
        retry: RetryPolicy,
    ) -> Result<Self, InferenceError> {
        if api_key.trim().is_empty() {
            return Err(InferenceError::MissingApiKey);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            client,
            retry,
            referer: None,
        })
    }

    /// Sent as `HTTP-Referer` for attribution on the provider side.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", CLIENT_TITLE)
            .json(body);
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("Invalid API response structure".into()))?
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| InferenceError::InvalidResponse("No content in API response".into()))
    }
}

/// Request body for `/chat/completions`
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from `/chat/completions`
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: &str,
        model: &str,
    ) -> Result<String, InferenceError> {
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_payload,
                },
            ],
            temperature: 0.0,
        };

        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    if attempt + 1 >= self.retry.max_attempts() {
                        return Err(InferenceError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        model,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Inference call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
