//! One export job, end to end.
//!
//! The exporter owns the collaborator handles and drives the pipeline:
//! resolve per-message clips (fanned out under a concurrency cap, re-ordered
//! by message index), normalize per role, assemble the gapped timeline, and
//! finish. Collaborators are injected at construction; nothing here reaches
//! for process-global state.

use super::finisher::TrackFinisher;
use super::normalizer::{ClipNormalizer, USER_TARGET_DBFS};
use super::source::{AudioClipSource, ClipRequest};
use super::timeline::{TimelineAssembler, TimelineEntry};
use super::{ExportError, VoiceDefaults};
use crate::audio::clip::AudioClip;
use crate::audio::tone;
use crate::cache::TtsCache;
use crate::speech::{Asr, CloningTts, CloudTts};
use crate::storage::{self, ObjectStore};
use crate::transcript::{Character, SpeakerRole, Transcript, VoiceSpec};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Default cap on concurrent outbound synthesis calls.
pub const DEFAULT_SYNTHESIS_CONCURRENCY: usize = 4;

/// How the job renders user turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserVoiceChoice {
    /// The configured default preset.
    Default,
    /// A named cloud preset.
    CloudPreset(String),
    /// Clone the voice from an uploaded sample.
    CustomUpload,
    /// Clone the voice from an in-app recording.
    CustomRecording,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub intro_text: String,
    pub outro_text: String,
    /// Override for the bookend host voice; defaults to the configured one.
    pub host_voice: Option<String>,
    pub language: String,
    pub synthesis_concurrency: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            intro_text: "Welcome to this conversation podcast.".to_string(),
            outro_text: "Thanks for listening. Goodbye!".to_string(),
            host_voice: None,
            language: "en".to_string(),
            synthesis_concurrency: DEFAULT_SYNTHESIS_CONCURRENCY,
        }
    }
}

/// Everything one export needs, owned for its duration. Upload payloads are
/// read into these buffers exactly once at job entry; no stage ever re-reads
/// a stream.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub transcript: Transcript,
    pub character: Character,
    pub user_voice: UserVoiceChoice,
    pub user_voice_upload: Option<Vec<u8>>,
    pub background_music: Option<Vec<u8>>,
    pub options: ExportOptions,
}

pub struct PodcastExporter {
    cloud: Arc<dyn CloudTts>,
    cloning: Arc<dyn CloningTts>,
    asr: Arc<dyn Asr>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn TtsCache>,
    defaults: VoiceDefaults,
}

impl PodcastExporter {
    pub fn new(
        cloud: Arc<dyn CloudTts>,
        cloning: Arc<dyn CloningTts>,
        asr: Arc<dyn Asr>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn TtsCache>,
        defaults: VoiceDefaults,
    ) -> Self {
        Self {
            cloud,
            cloning,
            asr,
            store,
            cache,
            defaults,
        }
    }

    /// Run one job to a finished MP3 buffer.
    pub async fn export(&self, job: ExportJob) -> Result<Vec<u8>, ExportError> {
        info!(
            messages = job.transcript.len(),
            character = %job.character.name,
            user_voice = ?job.user_voice,
            "starting podcast export"
        );

        let user_spec = self.resolve_user_voice(&job).await;
        let character_spec = VoiceSpec::for_character(&job.character);

        let source = Arc::new(AudioClipSource::new(
            self.cloud.clone(),
            self.cloning.clone(),
            self.asr.clone(),
            self.store.clone(),
            self.cache.clone(),
            self.defaults.clone(),
            job.options.language.clone(),
        ));

        let clips = self
            .resolve_clips(&job, source, Arc::new(user_spec), Arc::new(character_spec))
            .await;

        let normalizer = ClipNormalizer::new();
        let mut entries = Vec::with_capacity(clips.len() * 2);
        let last = clips.len().saturating_sub(1);
        for (i, (role, clip)) in clips.into_iter().enumerate() {
            let conditioned = match role {
                SpeakerRole::User => normalizer.normalize_with_gain(clip, USER_TARGET_DBFS),
                SpeakerRole::Ai => normalizer.normalize(clip),
            };
            entries.push(TimelineEntry::voice(conditioned));
            if i < last {
                entries.push(TimelineEntry::pause());
            }
        }

        let body = TimelineAssembler::new().assemble(entries);

        let host_voice = job
            .options
            .host_voice
            .clone()
            .unwrap_or_else(|| self.defaults.host_preset.clone());
        let finisher = TrackFinisher::new(self.cloud.clone(), host_voice);
        finisher
            .finish(
                body,
                &job.options.intro_text,
                &job.options.outro_text,
                job.background_music.as_deref(),
            )
            .await
    }

    /// Fan synthesis out under the concurrency cap and re-sequence the
    /// results by message index. Every slot is filled: a lost task degrades
    /// to the placeholder tone rather than dropping the message.
    async fn resolve_clips(
        &self,
        job: &ExportJob,
        source: Arc<AudioClipSource>,
        user_spec: Arc<VoiceSpec>,
        character_spec: Arc<VoiceSpec>,
    ) -> Vec<(SpeakerRole, AudioClip)> {
        let permits = Arc::new(Semaphore::new(job.options.synthesis_concurrency.max(1)));
        let character_id = Arc::new(job.character.id.clone());

        let mut tasks = JoinSet::new();
        for (index, message) in job.transcript.messages.iter().enumerate() {
            let source = source.clone();
            let permits = permits.clone();
            let character_id = character_id.clone();
            let role = message.role();
            let text = message.content.clone();
            let audio_ref = message.audio_ref.clone();
            let voice = match role {
                SpeakerRole::User => user_spec.clone(),
                SpeakerRole::Ai => character_spec.clone(),
            };

            tasks.spawn(async move {
                // Permit acquisition only fails if the semaphore is closed,
                // which never happens here.
                let _permit = permits.acquire_owned().await;
                let clip = source
                    .resolve(ClipRequest {
                        text: &text,
                        role,
                        voice: &voice,
                        existing_audio_ref: audio_ref.as_deref(),
                        cache_identity: match role {
                            SpeakerRole::Ai => Some(character_id.as_str()),
                            SpeakerRole::User => None,
                        },
                    })
                    .await;
                (index, clip)
            });
        }

        let mut slots: Vec<Option<AudioClip>> = vec![None; job.transcript.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, clip)) => slots[index] = Some(clip),
                Err(e) => warn!("synthesis task lost: {}", e),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let message = &job.transcript.messages[index];
                let role = message.role();
                let clip = slot.unwrap_or_else(|| {
                    warn!(index, "substituting placeholder tone for lost task");
                    tone::placeholder_tone(role, message.content.len())
                });
                (role, clip)
            })
            .collect()
    }

    /// Turn the job's user-voice choice into a spec, pushing a custom upload
    /// to object storage exactly once. Upload failure degrades to the default
    /// preset; it never aborts the job.
    async fn resolve_user_voice(&self, job: &ExportJob) -> VoiceSpec {
        match &job.user_voice {
            UserVoiceChoice::Default => VoiceSpec::DefaultFallback,
            UserVoiceChoice::CloudPreset(voice_id) => VoiceSpec::CloudPreset {
                voice_id: voice_id.clone(),
            },
            UserVoiceChoice::CustomUpload | UserVoiceChoice::CustomRecording => {
                let Some(bytes) = job.user_voice_upload.as_deref() else {
                    warn!("custom user voice chosen but no sample uploaded, using default");
                    return VoiceSpec::DefaultFallback;
                };
                let key = storage::user_voice_key("wav");
                match self.store.upload(bytes, &key, "audio/wav").await {
                    Ok(uri) => {
                        info!(%uri, "stored custom user voice sample");
                        VoiceSpec::Cloned {
                            reference_audio_uri: uri,
                            reference_text: None,
                            reference_language: job.options.language.clone(),
                        }
                    }
                    Err(e) => {
                        warn!("custom voice upload failed, using default: {}", e);
                        VoiceSpec::DefaultFallback
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode;
    use crate::cache::MemoryTtsCache;
    use crate::pipeline::test_support::*;
    use crate::transcript::Message;

    fn character() -> Character {
        Character {
            id: "character-7".to_string(),
            name: "Mira".to_string(),
            reference_audio_uri: Some("voices/mira.wav".to_string()),
            reference_text: Some("the reference line".to_string()),
            reference_language: Some("en".to_string()),
        }
    }

    fn message(content: &str, is_user: bool) -> Message {
        Message {
            content: content.to_string(),
            is_user,
            audio_ref: None,
        }
    }

    fn exporter(
        cloud: MockCloudTts,
        cloning: MockCloningTts,
        asr: MockAsr,
    ) -> (PodcastExporter, Arc<MockCloudTts>) {
        let cloud = Arc::new(cloud);
        let exporter = PodcastExporter::new(
            cloud.clone(),
            Arc::new(cloning),
            Arc::new(asr),
            Arc::new(MockObjectStore::new()),
            Arc::new(MemoryTtsCache::new()),
            VoiceDefaults::default(),
        );
        (exporter, cloud)
    }

    fn job(messages: Vec<Message>) -> ExportJob {
        ExportJob {
            transcript: Transcript::new(messages),
            character: character(),
            user_voice: UserVoiceChoice::Default,
            user_voice_upload: None,
            background_music: None,
            options: ExportOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_still_exports_bookends() {
        let (exporter, _) = exporter(MockCloudTts::ok(), MockCloningTts::ok(), MockAsr::ok());

        let mp3 = exporter.export(job(Vec::new())).await.unwrap();
        let track = decode::decode_to_pipeline(&mp3).unwrap();

        // Two 700 ms host lines and nothing else.
        assert!(
            (track.duration_ms() as i64 - 1400).abs() < 150,
            "got {} ms",
            track.duration_ms()
        );
    }

    #[tokio::test]
    async fn test_single_user_message_cloud_voice() {
        let (exporter, _) = exporter(MockCloudTts::ok(), MockCloningTts::failing(), MockAsr::ok());

        let mut j = job(vec![message("Hello", true)]);
        j.user_voice = UserVoiceChoice::CloudPreset("host_male_steady".to_string());

        let mp3 = exporter.export(j).await.unwrap();
        let track = decode::decode_to_pipeline(&mp3).unwrap();

        // intro (700) + clip (700) + outro (700); no pauses for one message.
        assert!(
            (track.duration_ms() as i64 - 2100).abs() < 200,
            "got {} ms",
            track.duration_ms()
        );
    }

    #[tokio::test]
    async fn test_every_collaborator_down_still_produces_audio() {
        let (exporter, _) = exporter(
            MockCloudTts::failing(),
            MockCloningTts::failing(),
            MockAsr::failing(),
        );

        let mp3 = exporter
            .export(job(vec![
                message("first message here", true),
                message("a reply from the character", false),
                message("closing words", true),
            ]))
            .await
            .unwrap();

        // Three placeholder tones with two 500 ms gaps, no bookends.
        let track = decode::decode_to_pipeline(&mp3).unwrap();
        assert!(track.duration_ms() > 3000, "got {} ms", track.duration_ms());
    }

    #[tokio::test]
    async fn test_empty_transcript_with_dead_collaborators_is_fatal() {
        let (exporter, _) = exporter(
            MockCloudTts::failing(),
            MockCloningTts::failing(),
            MockAsr::failing(),
        );

        let result = exporter.export(job(Vec::new())).await;
        assert!(matches!(result, Err(ExportError::NoAudio)));
    }

    #[tokio::test]
    async fn test_bookends_survive_broken_cloning_with_custom_voice() {
        // Intro/outro must come from the cloud host voice no matter which
        // user voice the job picked; a dead cloning backend cannot touch
        // them.
        let (exporter, cloud) =
            exporter(MockCloudTts::ok(), MockCloningTts::failing(), MockAsr::failing());

        let mut j = job(vec![message("spoken with my voice", true)]);
        j.user_voice = UserVoiceChoice::CustomUpload;
        j.user_voice_upload = Some(tone_wav(500.0, 800));

        let mp3 = exporter.export(j).await.unwrap();
        let track = decode::decode_to_pipeline(&mp3).unwrap();

        // intro + message (via cloud fallback) + outro all rendered through
        // the cloud mock.
        assert!(cloud.call_count() >= 3);
        assert!(track.duration_ms() > 2000, "got {} ms", track.duration_ms());
    }

    #[tokio::test]
    async fn test_transcript_order_is_preserved_under_fanout() {
        let (exporter, _) = exporter(
            MockCloudTts::failing(),
            MockCloningTts::failing(),
            MockAsr::failing(),
        );

        // All synthesis fails, so each message renders as its deterministic
        // placeholder tone; text lengths map to distinct frequencies.
        let texts = ["a", "bbbb", "ccccccc", "dddddddddd"];
        let mut j = job(
            texts
                .iter()
                .map(|t| message(t, false))
                .collect(),
        );
        j.options.intro_text = String::new();
        j.options.outro_text = String::new();

        let mp3 = exporter.export(j).await.unwrap();
        let track = decode::decode_to_pipeline(&mp3).unwrap();

        // Duration additivity: tones are 440/560/680/800 ms, padded to the
        // 500 ms floor where shorter, plus three 500 ms gaps.
        let expected: i64 = 500 + 560 + 680 + 800 + 3 * 500;
        assert!(
            (track.duration_ms() as i64 - expected).abs() < 200,
            "expected about {} ms, got {}",
            expected,
            track.duration_ms()
        );
    }

    #[tokio::test]
    async fn test_background_music_is_optional_cosmetics() {
        let (exporter, _) = exporter(MockCloudTts::ok(), MockCloningTts::ok(), MockAsr::ok());

        let mut with_garbage_music = job(vec![message("hello", false)]);
        with_garbage_music.background_music = Some(b"definitely not audio".to_vec());

        // Unreadable music skips the overlay instead of failing the export.
        let mp3 = exporter.export(with_garbage_music).await.unwrap();
        assert!(!mp3.is_empty());
    }
}
