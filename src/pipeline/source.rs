//! Per-message clip resolution with an explicit fallback chain.
//!
//! Strategies are tried in a fixed order (existing rendered audio, cached
//! synthesis, voice cloning, cloud preset, placeholder tone) and each one
//! catches its own failure and falls through to the next. The chain ends in a
//! deterministic generated tone, so resolution as a whole never fails and a
//! single bad message can never abort an export.

use super::VoiceDefaults;
use crate::audio::clip::AudioClip;
use crate::audio::{decode, tone};
use crate::cache::{self, TtsCache};
use crate::speech::{Asr, CloneRequest, CloningTts, CloudTts};
use crate::storage::ObjectStore;
use crate::transcript::{SpeakerRole, VoiceSpec};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Synthesis speed; part of every cache key.
const SYNTH_SPEED: f32 = 1.0;

/// One clip-resolution request.
#[derive(Debug)]
pub struct ClipRequest<'a> {
    pub text: &'a str,
    pub role: SpeakerRole,
    pub voice: &'a VoiceSpec,
    /// URI of already-rendered audio attached to the message, if any.
    pub existing_audio_ref: Option<&'a str>,
    /// Voice identity synthesis results are cached under. `None` disables
    /// caching: user-voice synthesis may depend on per-job uploads and is
    /// regenerated every call.
    pub cache_identity: Option<&'a str>,
}

pub struct AudioClipSource {
    cloud: Arc<dyn CloudTts>,
    cloning: Arc<dyn CloningTts>,
    asr: Arc<dyn Asr>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn TtsCache>,
    defaults: VoiceDefaults,
    language: String,
    /// Reference transcripts obtained via ASR, memoized for this job only.
    reference_texts: Mutex<HashMap<String, String>>,
}

impl AudioClipSource {
    pub fn new(
        cloud: Arc<dyn CloudTts>,
        cloning: Arc<dyn CloningTts>,
        asr: Arc<dyn Asr>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn TtsCache>,
        defaults: VoiceDefaults,
        language: String,
    ) -> Self {
        Self {
            cloud,
            cloning,
            asr,
            store,
            cache,
            defaults,
            language,
            reference_texts: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one message into a clip. Infallible by construction.
    pub async fn resolve(&self, request: ClipRequest<'_>) -> AudioClip {
        match self.try_existing_audio(&request).await {
            Ok(clip) => {
                info!(strategy = "existing_audio", role = ?request.role, "clip resolved");
                return clip;
            }
            Err(reason) => debug!(%reason, "existing-audio strategy skipped"),
        }

        match self.try_cached(&request).await {
            Ok(clip) => {
                info!(strategy = "cached_synthesis", role = ?request.role, "clip resolved");
                return clip;
            }
            Err(reason) => debug!(%reason, "cache strategy skipped"),
        }

        match self.try_cloning(&request).await {
            Ok(clip) => {
                info!(strategy = "cloning_synthesis", role = ?request.role, "clip resolved");
                return clip;
            }
            Err(reason) => debug!(%reason, "cloning strategy skipped"),
        }

        match self.try_cloud(&request).await {
            Ok(clip) => {
                info!(strategy = "cloud_synthesis", role = ?request.role, "clip resolved");
                return clip;
            }
            Err(reason) => debug!(%reason, "cloud strategy skipped"),
        }

        warn!(
            role = ?request.role,
            text_len = request.text.len(),
            "all synthesis strategies failed, substituting placeholder tone"
        );
        tone::placeholder_tone(request.role, request.text.len())
    }

    async fn try_existing_audio(&self, request: &ClipRequest<'_>) -> Result<AudioClip, String> {
        if request.role != SpeakerRole::Ai {
            return Err("existing audio is only honored for AI messages".to_string());
        }
        let uri = request
            .existing_audio_ref
            .ok_or_else(|| "no existing audio reference".to_string())?;
        let bytes = self
            .store
            .fetch(uri)
            .await
            .map_err(|e| format!("fetch failed: {}", e))?;
        decode::decode_to_pipeline(&bytes).map_err(|e| format!("decode failed: {}", e))
    }

    async fn try_cached(&self, request: &ClipRequest<'_>) -> Result<AudioClip, String> {
        let identity = request
            .cache_identity
            .ok_or_else(|| "synthesis for this speaker is not cached".to_string())?;
        let key = cache::cache_key(request.text, identity, SYNTH_SPEED);
        let bytes = self
            .cache
            .get(&key)
            .await
            .ok_or_else(|| "cache miss".to_string())?;
        decode::decode_to_pipeline(&bytes).map_err(|e| format!("cached audio unreadable: {}", e))
    }

    async fn try_cloning(&self, request: &ClipRequest<'_>) -> Result<AudioClip, String> {
        let VoiceSpec::Cloned {
            reference_audio_uri,
            reference_text,
            reference_language,
        } = request.voice
        else {
            return Err("voice is not cloned".to_string());
        };

        let prompt_text = self
            .reference_text_for(
                reference_audio_uri,
                reference_language,
                reference_text.as_deref(),
            )
            .await?;

        let bytes = self
            .cloning
            .synthesize_with_reference(CloneRequest {
                text: request.text,
                text_language: &self.language,
                reference_audio_uri,
                reference_text: &prompt_text,
                reference_language,
            })
            .await
            .map_err(|e| format!("cloning synthesis failed: {}", e))?;

        let clip = decode::decode_to_pipeline(&bytes)
            .map_err(|e| format!("cloned audio unreadable: {}", e))?;
        self.cache_synthesis(request, &bytes).await;
        Ok(clip)
    }

    async fn try_cloud(&self, request: &ClipRequest<'_>) -> Result<AudioClip, String> {
        // Cloned voices that fell through land here on the role's default
        // preset, mirroring DefaultFallback.
        let voice_id = match request.voice {
            VoiceSpec::CloudPreset { voice_id } => voice_id.as_str(),
            _ => self.default_preset(request.role),
        };

        let bytes = self
            .cloud
            .synthesize(request.text, voice_id, SYNTH_SPEED)
            .await
            .map_err(|e| format!("cloud synthesis failed: {}", e))?;

        let clip = decode::decode_to_pipeline(&bytes)
            .map_err(|e| format!("cloud audio unreadable: {}", e))?;
        self.cache_synthesis(request, &bytes).await;
        Ok(clip)
    }

    fn default_preset(&self, role: SpeakerRole) -> &str {
        match role {
            SpeakerRole::User => &self.defaults.user_preset,
            SpeakerRole::Ai => &self.defaults.character_preset,
        }
    }

    /// Write a successful synthesis result back to the cache. Only cacheable
    /// requests (AI messages) carry an identity; cache failures are absorbed
    /// by the cache itself.
    async fn cache_synthesis(&self, request: &ClipRequest<'_>, bytes: &[u8]) {
        if let Some(identity) = request.cache_identity {
            let key = cache::cache_key(request.text, identity, SYNTH_SPEED);
            self.cache.put(&key, bytes).await;
        }
    }

    /// The cloning prompt transcript: taken from the character record when
    /// present, otherwise transcribed once per job via ASR and memoized.
    async fn reference_text_for(
        &self,
        reference_audio_uri: &str,
        language: &str,
        existing: Option<&str>,
    ) -> Result<String, String> {
        if let Some(text) = existing {
            if !text.trim().is_empty() {
                return Ok(text.to_string());
            }
        }

        if let Some(text) = self.reference_texts.lock().await.get(reference_audio_uri) {
            return Ok(text.clone());
        }

        let text = self
            .asr
            .transcribe(reference_audio_uri, language)
            .await
            .map_err(|e| format!("reference transcription failed: {}", e))?;
        info!(uri = reference_audio_uri, "transcribed cloning reference via ASR");

        self.reference_texts
            .lock()
            .await
            .insert(reference_audio_uri.to_string(), text.clone());
        Ok(text)
    }
}
