//! Language-model completion client.
//!
//! The repair loop talks to the model through the [`CompletionClient`]
//! trait so tests can script responses; [`OpenRouterClient`] is the real
//! implementation.

use crate::util::truncate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// OpenRouter chat completions endpoint.
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model when the config names none.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

/// Retry configuration for transient failures (rate limits, 5xx).
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// One blocking completion call. Implementations retry transient service
/// failures themselves; anything returned as `Err` is not worth retrying.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Chat-completion client backed by OpenRouter.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

/// Extract a retry-after hint from a rate-limit response body, if present.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    if let Some(pos) = text_lower.find("retry") {
        let after_retry = &text_lower[pos..];
        for word in after_retry.split_whitespace().skip(1).take(5) {
            if let Ok(secs) = word
                .trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
            {
                if secs > 0 && secs < 300 {
                    return Some(secs);
                }
            }
        }
    }
    None
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
            max_tokens,
            stream: false,
        };

        debug!(
            model = %self.model,
            temperature,
            max_tokens,
            prompt_chars = user.chars().count(),
            "sending completion request"
        );

        let mut last_error = String::new();
        let mut retry_count = 0;

        while retry_count <= MAX_RETRIES {
            let response = self
                .client
                .post(OPENROUTER_URL)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to parse completion response: {}\n{}",
                        e,
                        truncate(&text, 200)
                    )
                })?;

                let content = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default();

                debug!(response_chars = content.chars().count(), "received completion");
                return Ok(content);
            }

            last_error = text.clone();

            // Rate limits and server errors are transient; back off and retry.
            let transient = status.as_u16() == 429 || status.is_server_error();
            if transient && retry_count < MAX_RETRIES {
                retry_count += 1;

                let retry_after = parse_retry_after(&text).unwrap_or_else(|| {
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000
                });

                warn!(
                    status = status.as_u16(),
                    retry_in_secs = retry_after,
                    attempt = retry_count,
                    "model service unavailable, retrying"
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(retry_after)).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid API key. Set MEND_API_KEY or run with a valid config.".to_string(),
                429 => format!("Rate limited after {} retries", retry_count),
                500..=599 => format!("Model service error ({}) after retries", status),
                _ => format!("API error {}: {}", status, truncate(&text, 200)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }

        Err(anyhow::anyhow!("{}", last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::parse_retry_after;

    #[test]
    fn test_parse_retry_after_finds_seconds() {
        assert_eq!(
            parse_retry_after("rate limited, retry after 12 seconds"),
            Some(12)
        );
    }

    #[test]
    fn test_parse_retry_after_ignores_huge_values() {
        assert_eq!(parse_retry_after("retry after 4000 seconds"), None);
        assert_eq!(parse_retry_after("try again later"), None);
    }
}
