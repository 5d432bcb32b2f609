//! Cloud preset-voice TTS client.
//!
//! JSON-in, base64-audio-out API with a primary and an optional backup
//! endpoint. A failed primary call is retried once against the backup before
//! the error is surfaced.

use super::{CloudTts, NETWORK_TIMEOUT, SpeechError, http_client};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct CloudTtsClient {
    client: Client,
    base_url: String,
    backup_url: Option<String>,
    api_key: SecretString,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    audio: TtsAudioParams<'a>,
    request: TtsTextParams<'a>,
}

#[derive(Serialize)]
struct TtsAudioParams<'a> {
    voice_type: &'a str,
    encoding: &'a str,
    speed_ratio: f32,
}

#[derive(Serialize)]
struct TtsTextParams<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TtsResponse {
    /// Base64-encoded audio payload.
    data: Option<String>,
}

impl CloudTtsClient {
    pub fn new(base_url: String, backup_url: Option<String>, api_key: SecretString) -> Self {
        Self {
            client: http_client(NETWORK_TIMEOUT),
            base_url,
            backup_url,
            api_key,
        }
    }

    async fn request_voice(
        &self,
        endpoint: &str,
        body: &TtsRequest<'_>,
    ) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(format!("{}/voice/tts", endpoint))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
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

        let parsed: TtsResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::BadPayload(e.to_string()))?;

        decode_audio_payload(parsed)
    }
}

/// Extract and decode the base64 audio field of a TTS response.
fn decode_audio_payload(response: TtsResponse) -> Result<Vec<u8>, SpeechError> {
    let data = response
        .data
        .ok_or_else(|| SpeechError::BadPayload("response carried no audio data".to_string()))?;
    BASE64
        .decode(data.as_bytes())
        .map_err(|e| SpeechError::BadPayload(format!("invalid base64 audio: {}", e)))
}

#[async_trait]
impl CloudTts for CloudTtsClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed: f32,
    ) -> Result<Vec<u8>, SpeechError> {
        let body = TtsRequest {
            audio: TtsAudioParams {
                voice_type: voice_id,
                encoding: "mp3",
                speed_ratio: speed,
            },
            request: TtsTextParams { text },
        };

        debug!(voice = voice_id, text_len = text.len(), "cloud TTS request");

        match self.request_voice(&self.base_url, &body).await {
            Ok(audio) => {
                debug!(bytes = audio.len(), "cloud TTS synthesis complete");
                Ok(audio)
            }
            Err(primary_err) => {
                let Some(backup) = &self.backup_url else {
                    return Err(primary_err);
                };
                warn!(
                    "primary TTS endpoint failed ({}), retrying against backup",
                    primary_err
                );
                self.request_voice(backup, &body).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio_payload() {
        let encoded = BASE64.encode(b"fake-mp3-bytes");
        let response = TtsResponse {
            data: Some(encoded),
        };
        assert_eq!(decode_audio_payload(response).unwrap(), b"fake-mp3-bytes");
    }

    #[test]
    fn test_missing_data_field_is_rejected() {
        let response = TtsResponse { data: None };
        assert!(matches!(
            decode_audio_payload(response),
            Err(SpeechError::BadPayload(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = TtsRequest {
            audio: TtsAudioParams {
                voice_type: "host_male_1",
                encoding: "mp3",
                speed_ratio: 1.0,
            },
            request: TtsTextParams { text: "hello" },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["audio"]["voice_type"], "host_male_1");
        assert_eq!(json["request"]["text"], "hello");
    }
}
