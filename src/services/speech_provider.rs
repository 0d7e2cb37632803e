//! Cloud pronunciation assessment. One request per scored attempt; the
//! recognizer grades the audio against a reference text and returns
//! per-utterance and per-word scores.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MAX_RETRIES: usize = 2;
const BASE_BACKOFF_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub subscription_key: Option<String>,
    pub region: Option<String>,
    pub language: String,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service not configured: {0}")]
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
    #[error("speech not recognized")]
    NotRecognized,
}

/// Scores for one assessed attempt, plus the per-word detail used to
/// persist error rows.
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub provider_id: Uuid,
    pub display_text: String,
    pub accuracy: f64,
    pub fluency: f64,
    pub completeness: f64,
    pub pronunciation: f64,
    pub words: Vec<AssessedWord>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AssessedWord {
    pub word: String,
    pub accuracy: f64,
    pub error_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
    #[serde(default, rename = "NBest")]
    n_best: Vec<NBestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NBestEntry {
    #[serde(default)]
    display: Option<String>,
    #[serde(default)]
    accuracy_score: f64,
    #[serde(default)]
    fluency_score: f64,
    #[serde(default)]
    completeness_score: f64,
    #[serde(default)]
    pron_score: f64,
    #[serde(default)]
    words: Vec<WordEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WordEntry {
    word: String,
    #[serde(default)]
    accuracy_score: f64,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Clone)]
pub struct SpeechProvider {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl SpeechProvider {
    pub fn from_env() -> Self {
        let subscription_key = env_string("SPEECH_KEY");
        let region = env_string("SPEECH_REGION");
        let language = env_string("SPEECH_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let timeout =
            Duration::from_millis(env_u64("SPEECH_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: SpeechConfig {
                subscription_key,
                region,
                language,
            },
            client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.config
            .subscription_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
            && self
                .config
                .region
                .as_deref()
                .is_some_and(|v| !v.trim().is_empty())
    }

    /// Grades a WAV recording against the reference text.
    pub async fn assess(
        &self,
        audio: Vec<u8>,
        reference_text: &str,
    ) -> Result<AssessmentOutcome, SpeechError> {
        let key = self
            .config
            .subscription_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(SpeechError::NotConfigured("SPEECH_KEY"))?;
        let region = self
            .config
            .region
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(SpeechError::NotConfigured("SPEECH_REGION"))?;

        let url = format!(
            "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language={}&format=detailed",
            self.config.language
        );

        let assessment_config = serde_json::json!({
            "ReferenceText": reference_text,
            "GradingSystem": "HundredMark",
            "Granularity": "Phoneme",
            "Dimension": "Comprehensive",
            "EnableProsodyAssessment": true,
        });
        let assessment_header = STANDARD.encode(assessment_config.to_string());

        let raw = self
            .post_with_retry(&url, key, &assessment_header, audio)
            .await?;

        let parsed: RecognitionResponse = serde_json::from_value(raw.clone())?;
        if parsed.recognition_status != "Success" {
            return Err(SpeechError::NotRecognized);
        }

        let best = parsed.n_best.into_iter().next().ok_or(SpeechError::NotRecognized)?;

        let words = best
            .words
            .into_iter()
            .map(|w| AssessedWord {
                word: w.word,
                accuracy: w.accuracy_score,
                error_type: w.error_type.unwrap_or_else(|| "None".to_string()),
            })
            .collect();

        Ok(AssessmentOutcome {
            provider_id: Uuid::new_v4(),
            display_text: best
                .display
                .or(parsed.display_text)
                .unwrap_or_default(),
            accuracy: best.accuracy_score,
            fluency: best.fluency_score,
            completeness: best.completeness_score,
            pronunciation: best.pron_score,
            words,
            raw,
        })
    }

    async fn post_with_retry(
        &self,
        url: &str,
        key: &str,
        assessment_header: &str,
        audio: Vec<u8>,
    ) -> Result<serde_json::Value, SpeechError> {
        let mut last_error: Option<SpeechError> = None;

        for retry in 0..=MAX_RETRIES {
            let request = self
                .client
                .post(url)
                .header("Ocp-Apim-Subscription-Key", key)
                .header("Pronunciation-Assessment", assessment_header)
                .header("Accept", "application/json")
                .header(
                    "Content-Type",
                    "audio/wav; codecs=audio/pcm; samplerate=16000",
                )
                .body(audio.clone());

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return serde_json::from_slice(&bytes).map_err(SpeechError::Json);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = SpeechError::HttpStatus { status, body };
                    if retry < MAX_RETRIES && is_retryable(status) {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, ?status, "speech request failed, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = SpeechError::Request(e);
                    if retry < MAX_RETRIES {
                        let backoff = Duration::from_millis(BASE_BACKOFF_MS * (1 << retry));
                        warn!(retry, "speech request error, retrying");
                        sleep(backoff).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_error.unwrap_or(SpeechError::NotConfigured("unknown")))
    }
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
    fn parses_detailed_recognition_payload() {
        let raw = serde_json::json!({
            "RecognitionStatus": "Success",
            "DisplayText": "The tornado damaged the house.",
            "NBest": [{
                "Display": "The tornado damaged the house.",
                "AccuracyScore": 88.0,
                "FluencyScore": 92.5,
                "CompletenessScore": 100.0,
                "PronScore": 90.1,
                "Words": [
                    {"Word": "tornado", "AccuracyScore": 71.0, "ErrorType": "Mispronunciation"},
                    {"Word": "house", "AccuracyScore": 95.0, "ErrorType": "None"}
                ]
            }]
        });

        let parsed: RecognitionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.recognition_status, "Success");
        let best = &parsed.n_best[0];
        assert_eq!(best.pron_score, 90.1);
        assert_eq!(best.words.len(), 2);
        assert_eq!(best.words[0].error_type.as_deref(), Some("Mispronunciation"));
    }

    #[test]
    fn missing_nbest_maps_to_not_recognized() {
        let raw = serde_json::json!({
            "RecognitionStatus": "InitialSilenceTimeout",
            "NBest": []
        });
        let parsed: RecognitionResponse = serde_json::from_value(raw).unwrap();
        assert_ne!(parsed.recognition_status, "Success");
    }
}
