//! ASR client for transcribing stored audio.
//!
//! Used by the clip source to lazily obtain a cloning reference transcript
//! when the character record lacks one.

use super::{Asr, NETWORK_TIMEOUT, SpeechError, http_client};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct AsrClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct AsrRequest<'a> {
    model: &'a str,
    audio: AsrAudioParams<'a>,
}

#[derive(Serialize)]
struct AsrAudioParams<'a> {
    format: &'a str,
    url: &'a str,
}

#[derive(Deserialize)]
struct AsrResponse {
    data: Option<AsrData>,
}

#[derive(Deserialize)]
struct AsrData {
    result: Option<AsrResult>,
}

#[derive(Deserialize)]
struct AsrResult {
    text: Option<String>,
}

impl AsrClient {
    pub fn new(base_url: String, api_key: SecretString) -> Self {
        Self {
            client: http_client(NETWORK_TIMEOUT),
            base_url,
            api_key,
        }
    }
}

/// Guess the container format from the URI extension; the service expects an
/// explicit format field.
fn audio_format_from_uri(uri: &str) -> &'static str {
    let lower = uri.to_lowercase();
    if lower.ends_with(".wav") {
        "wav"
    } else {
        "mp3"
    }
}

/// Pull the transcript text out of the nested response envelope.
fn extract_text(response: AsrResponse) -> Result<String, SpeechError> {
    response
        .data
        .and_then(|d| d.result)
        .and_then(|r| r.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SpeechError::BadPayload("response carried no transcript".to_string()))
}

#[async_trait]
impl Asr for AsrClient {
    async fn transcribe(&self, audio_uri: &str, language: &str) -> Result<String, SpeechError> {
        let body = AsrRequest {
            model: "asr",
            audio: AsrAudioParams {
                format: audio_format_from_uri(audio_uri),
                url: audio_uri,
            },
        };

        debug!(uri = audio_uri, language, "ASR request");

        let response = self
            .client
            .post(format!("{}/voice/asr", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(SpeechError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SpeechError::from_status(status.as_u16(), message));
        }

        let parsed: AsrResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::BadPayload(e.to_string()))?;

        let text = extract_text(parsed)?;
        debug!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_from_nested_envelope() {
        let response: AsrResponse = serde_json::from_str(
            r#"{"data": {"result": {"text": "  hello world  "}}}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "hello world");
    }

    #[test]
    fn test_empty_transcript_is_rejected() {
        let response: AsrResponse =
            serde_json::from_str(r#"{"data": {"result": {"text": "   "}}}"#).unwrap();
        assert!(extract_text(response).is_err());

        let missing: AsrResponse = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert!(extract_text(missing).is_err());
    }

    #[test]
    fn test_audio_format_from_uri() {
        assert_eq!(audio_format_from_uri("voices/ref.WAV"), "wav");
        assert_eq!(audio_format_from_uri("voices/ref.mp3"), "mp3");
        assert_eq!(audio_format_from_uri("voices/ref.ogg"), "mp3");
    }
}
