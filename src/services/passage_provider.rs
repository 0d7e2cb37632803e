//! LLM-backed practice passage generation. Talks to an OpenAI-compatible
//! chat completions endpoint and returns plain passage text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MAX_RETRIES: usize = 2;
const BASE_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Target sentence count for the generated passage.
    pub fn sentence_count(self) -> usize {
        match self {
            Difficulty::Easy => 2,
            Difficulty::Medium => 5,
            Difficulty::Hard => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassageProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("passage generation not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty completion from model")]
    EmptyCompletion,
    #[error("model returned malformed passage payload")]
    MalformedPayload,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeneratedSentence {
    text: String,
    #[allow(dead_code)]
    #[serde(default)]
    justification: Option<String>,
}

#[derive(Clone)]
pub struct PassageProvider {
    config: PassageProviderConfig,
    client: reqwest::Client,
}

impl PassageProvider {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY");
        let base_url = env_string("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: PassageProviderConfig {
                api_key,
                base_url,
                model,
            },
            client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }

    /// Generates a practice passage for the given topic. Returns the
    /// passage as a single string of sentences.
    pub async fn generate_passage(
        &self,
        description: &str,
        difficulty: Difficulty,
    ) -> Result<String, GenerationError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(GenerationError::NotConfigured("LLM_API_KEY"))?;

        let prompt = build_prompt(description, difficulty);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You generate short English reading passages for pronunciation practice. Respond with JSON only.",
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self.post_with_retry(&url, key, &body).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyCompletion)?;

        parse_passage(&content)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        key: &str,
        body: &ChatRequest<'_>,
    ) -> Result<ChatResponse, GenerationError> {
        let mut last_error: Option<GenerationError> = None;

        for retry in 0..=MAX_RETRIES {
            let result = self
                .client
                .post(url)
                .bearer_auth(key)
                .json(body)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(GenerationError::Json);
                    }
                    let text = resp.text().await.unwrap_or_default();
                    let err = GenerationError::HttpStatus { status, body: text };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        warn!(retry, ?status, "passage generation failed, retrying");
                        sleep(Duration::from_millis(BASE_BACKOFF_MS * (1 << retry))).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = GenerationError::Request(e);
                    if retry < MAX_RETRIES {
                        warn!(retry, "passage generation request error, retrying");
                        sleep(Duration::from_millis(BASE_BACKOFF_MS * (1 << retry))).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(GenerationError::EmptyCompletion))
    }
}

fn build_prompt(description: &str, difficulty: Difficulty) -> String {
    format!(
        "Write {count} sentences about the following topic: {description}. \
The sentences should form a coherent passage at {level} difficulty for an \
English learner. Reply with a JSON array where each element is an object \
with a \"text\" field holding one sentence and a \"justification\" field \
explaining the vocabulary choice. Do not include any other text.",
        count = difficulty.sentence_count(),
        level = difficulty.label(),
    )
}

/// Models often wrap JSON in markdown fences; strip them before parsing.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_passage(content: &str) -> Result<String, GenerationError> {
    let cleaned = strip_code_fences(content);
    let sentences: Vec<GeneratedSentence> =
        serde_json::from_str(cleaned).map_err(|_| GenerationError::MalformedPayload)?;
    if sentences.is_empty() {
        return Err(GenerationError::MalformedPayload);
    }
    Ok(sentences
        .into_iter()
        .map(|s| s.text.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_maps_to_sentence_counts() {
        assert_eq!(Difficulty::Easy.sentence_count(), 2);
        assert_eq!(Difficulty::Medium.sentence_count(), 5);
        assert_eq!(Difficulty::Hard.sentence_count(), 8);
    }

    #[test]
    fn parses_plain_json_array() {
        let content = r#"[
            {"text": "The cat sat.", "justification": "simple words"},
            {"text": "It purred softly.", "justification": "common verb"}
        ]"#;
        let passage = parse_passage(content).unwrap();
        assert_eq!(passage, "The cat sat. It purred softly.");
    }

    #[test]
    fn strips_markdown_fences() {
        let content = "```json\n[{\"text\": \"Hello there.\"}]\n```";
        let passage = parse_passage(content).unwrap();
        assert_eq!(passage, "Hello there.");
    }

    #[test]
    fn rejects_non_json_completion() {
        assert!(matches!(
            parse_passage("Sure! Here is your passage."),
            Err(GenerationError::MalformedPayload)
        ));
    }

    #[test]
    fn rejects_empty_array() {
        assert!(matches!(
            parse_passage("[]"),
            Err(GenerationError::MalformedPayload)
        ));
    }
}
