//! External speech collaborators: cloud TTS, cloning TTS, and ASR.
//!
//! Each capability is a trait so the pipeline can be wired with real HTTP
//! clients or test doubles. Every call carries its own timeout; a timed-out
//! call surfaces as an error the clip source treats as a fallback trigger.

pub mod asr;
pub mod cloning;
pub mod cloud;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use asr::AsrClient;
pub use cloning::CloningTtsClient;
pub use cloud::CloudTtsClient;

/// Timeout for ordinary network calls (cloud TTS, ASR, storage fetch).
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for cloning synthesis, which can run for minutes.
pub const CLONING_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider returned status {status}: {message}")]
    ProviderApi { status: u16, message: String },
    #[error("unusable response payload: {0}")]
    BadPayload(String),
}

impl SpeechError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Connection(e.to_string())
        }
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => SpeechError::AuthenticationFailed(message),
            400 => SpeechError::InvalidRequest(message),
            _ => SpeechError::ProviderApi { status, message },
        }
    }
}

/// Preset-voice synthesis.
#[async_trait]
pub trait CloudTts: Send + Sync {
    /// Synthesize `text` with a preset voice; returns encoded audio bytes.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed: f32,
    ) -> Result<Vec<u8>, SpeechError>;
}

/// One cloning-synthesis request.
#[derive(Debug, Clone)]
pub struct CloneRequest<'a> {
    pub text: &'a str,
    pub text_language: &'a str,
    pub reference_audio_uri: &'a str,
    pub reference_text: &'a str,
    pub reference_language: &'a str,
}

/// Synthesis conditioned on a reference audio sample.
#[async_trait]
pub trait CloningTts: Send + Sync {
    async fn synthesize_with_reference(
        &self,
        request: CloneRequest<'_>,
    ) -> Result<Vec<u8>, SpeechError>;
}

/// Speech recognition over a stored audio file.
#[async_trait]
pub trait Asr: Send + Sync {
    async fn transcribe(&self, audio_uri: &str, language: &str) -> Result<String, SpeechError>;
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build HTTP client")
}
