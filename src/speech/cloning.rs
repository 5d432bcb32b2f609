//! Voice-cloning TTS client.
//!
//! The cloning backend conditions synthesis on a reference sample and its
//! transcript, and can run for minutes per request; the client carries the
//! long timeout and returns the raw audio body.

use super::{CLONING_TIMEOUT, CloneRequest, CloningTts, SpeechError, http_client};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

pub struct CloningTtsClient {
    client: Client,
    base_url: String,
}

/// Sampling defaults for the cloning backend.
const TOP_K: u32 = 15;
const TOP_P: f32 = 1.0;
const TEMPERATURE: f32 = 1.0;
const SAMPLE_STEPS: u32 = 32;

#[derive(Serialize)]
struct CloningRequestBody<'a> {
    refer_wav_path: &'a str,
    prompt_text: &'a str,
    prompt_language: &'a str,
    text: &'a str,
    text_language: &'a str,
    top_k: u32,
    top_p: f32,
    temperature: f32,
    speed: f32,
    sample_steps: u32,
}

impl CloningTtsClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: http_client(CLONING_TIMEOUT),
            base_url,
        }
    }
}

#[async_trait]
impl CloningTts for CloningTtsClient {
    async fn synthesize_with_reference(
        &self,
        request: CloneRequest<'_>,
    ) -> Result<Vec<u8>, SpeechError> {
        let body = CloningRequestBody {
            refer_wav_path: request.reference_audio_uri,
            prompt_text: request.reference_text,
            prompt_language: request.reference_language,
            text: request.text,
            text_language: request.text_language,
            top_k: TOP_K,
            top_p: TOP_P,
            temperature: TEMPERATURE,
            speed: 1.0,
            sample_steps: SAMPLE_STEPS,
        };

        debug!(
            reference = request.reference_audio_uri,
            text_len = request.text.len(),
            "cloning TTS request"
        );

        let response = self
            .client
            .post(&self.base_url)
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

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::BadPayload(e.to_string()))?;

        if audio.is_empty() {
            return Err(SpeechError::BadPayload(
                "cloning backend returned an empty body".to_string(),
            ));
        }

        debug!(bytes = audio.len(), "cloning synthesis complete");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = CloningRequestBody {
            refer_wav_path: "voices/ref.wav",
            prompt_text: "reference line",
            prompt_language: "en",
            text: "hello there",
            text_language: "en",
            top_k: TOP_K,
            top_p: TOP_P,
            temperature: TEMPERATURE,
            speed: 1.0,
            sample_steps: SAMPLE_STEPS,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["refer_wav_path"], "voices/ref.wav");
        assert_eq!(json["prompt_text"], "reference line");
        assert_eq!(json["text"], "hello there");
        assert_eq!(json["sample_steps"], 32);
    }
}
