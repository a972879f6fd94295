//! HTTP completion client for OpenAI-compatible and Anthropic endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use topicgen_types::{ApiProvider, ApiSettings};

use super::{CompletionClient, CompletionError, CompletionParams};
use crate::tokens::{TiktokenCounter, TokenCounter};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion client that talks to a hosted model API.
pub struct ApiCompletionClient {
    client: Client,
    provider: ApiProvider,
    base_url: String,
    model: String,
    api_key: SecretString,
    max_retries: u32,
    max_elapsed: Duration,
    counter: TiktokenCounter,
}

impl ApiCompletionClient {
    /// Build a client from API settings.
    ///
    /// Fails when no key is configured or set in the provider's env var.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, CompletionError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            CompletionError::Config(format!(
                "no API key: set api.api_key or {}",
                settings.provider.api_key_env()
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Config(e.to_string()))?;

        Ok(Self {
            client,
            provider: settings.provider,
            base_url: settings
                .effective_base_url()
                .trim_end_matches('/')
                .to_string(),
            model: settings.model.clone(),
            api_key: SecretString::from(api_key),
            max_retries: settings.max_retries.max(1),
            max_elapsed: Duration::from_secs(120),
            counter: TiktokenCounter::for_model(&settings.model),
        })
    }

    /// Cap total time spent retrying one call.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the API with retry logic.
    async fn call_api(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.model, "Calling completion API");

            let result = match self.provider {
                ApiProvider::OpenAi => self.make_openai_request(prompt, params).await,
                ApiProvider::Anthropic => self.make_anthropic_request(prompt, params).await,
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    if attempts >= self.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "API call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn make_openai_request(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            max_tokens: usize,
            temperature: f32,
            top_p: f32,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            #[serde(default)]
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let body: OpenAIResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| CompletionError::Parse("No choices in response".to_string()))
    }

    async fn make_anthropic_request(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: usize,
            temperature: f32,
            top_p: f32,
            messages: Vec<ChatMessage<'a>>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let body: AnthropicResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        if body.content.is_empty() {
            return Err(CompletionError::Parse("No content in response".to_string()));
        }
        Ok(body
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn map_send_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Api(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, CompletionError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(CompletionError::RateLimitExceeded);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError::Api(format!("HTTP {}: {}", status, body)));
    }
    Ok(response)
}

/// Client errors and unparseable bodies will not improve on retry.
fn is_retryable(e: &CompletionError) -> bool {
    match e {
        CompletionError::RateLimitExceeded | CompletionError::Timeout => true,
        CompletionError::Api(msg) => !msg.starts_with("HTTP 4"),
        CompletionError::Parse(_) | CompletionError::Config(_) | CompletionError::Interrupted => {
            false
        }
    }
}

impl TokenCounter for ApiCompletionClient {
    fn count_tokens(&self, text: &str) -> usize {
        self.counter.count_tokens(text)
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        self.counter.truncate_to_tokens(text, max_tokens)
    }
}

#[async_trait]
impl CompletionClient for ApiCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        self.call_api(prompt, params).await
    }
}
