//! Podcast audio assembly pipeline.
//!
//! Stages, leaf-first: [`source::AudioClipSource`] resolves one message into
//! a clip, [`normalizer::ClipNormalizer`] makes clips comparable,
//! [`timeline::TimelineAssembler`] builds the ordered gapped track,
//! [`finisher::TrackFinisher`] masters and encodes it. The
//! [`export::PodcastExporter`] drives one job end to end.

pub mod export;
pub mod finisher;
pub mod normalizer;
pub mod source;
pub mod timeline;

use crate::audio::EncodeError;
use thiserror::Error;

pub use export::{ExportJob, ExportOptions, PodcastExporter, UserVoiceChoice};
pub use finisher::TrackFinisher;
pub use normalizer::ClipNormalizer;
pub use source::{AudioClipSource, ClipRequest};
pub use timeline::{TimelineAssembler, TimelineEntry};

/// The only failures an export surfaces; everything below these recovers
/// locally (fallback clip, skipped overlay, pass-through normalization).
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no audio produced")]
    NoAudio,
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
}

/// Preset voice ids used when a job makes no explicit choice.
#[derive(Debug, Clone)]
pub struct VoiceDefaults {
    /// Preset for user turns rendered without a custom voice.
    pub user_preset: String,
    /// Preset AI turns fall back to when cloning is unavailable.
    pub character_preset: String,
    /// The "host" voice every intro/outro is rendered with.
    pub host_preset: String,
}

impl Default for VoiceDefaults {
    fn default() -> Self {
        Self {
            user_preset: "host_male_steady".to_string(),
            character_preset: "host_female_warm".to_string(),
            host_preset: "host_male_steady".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Collaborator doubles shared by the pipeline tests.

    use crate::audio::{encode_wav, tone};
    use crate::speech::{Asr, CloneRequest, CloningTts, CloudTts, SpeechError};
    use crate::storage::{ObjectStore, StorageError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn tone_wav(freq: f64, duration_ms: u64) -> Vec<u8> {
        encode_wav(&tone::sine(freq, duration_ms)).unwrap()
    }

    pub struct MockCloudTts {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub freq: f64,
        pub duration_ms: u64,
    }

    impl MockCloudTts {
        pub fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                freq: 550.0,
                duration_ms: 700,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CloudTts for MockCloudTts {
        async fn synthesize(
            &self,
            _text: &str,
            _voice_id: &str,
            _speed: f32,
        ) -> Result<Vec<u8>, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SpeechError::Timeout);
            }
            Ok(tone_wav(self.freq, self.duration_ms))
        }
    }

    pub struct MockCloningTts {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl MockCloningTts {
        pub fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CloningTts for MockCloningTts {
        async fn synthesize_with_reference(
            &self,
            _request: CloneRequest<'_>,
        ) -> Result<Vec<u8>, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SpeechError::Connection("refused".to_string()));
            }
            Ok(tone_wav(660.0, 900))
        }
    }

    pub struct MockAsr {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl MockAsr {
        pub fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Asr for MockAsr {
        async fn transcribe(
            &self,
            _audio_uri: &str,
            _language: &str,
        ) -> Result<String, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SpeechError::Timeout);
            }
            Ok("reference transcript".to_string())
        }
    }

    #[derive(Default)]
    pub struct MockObjectStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub fetches: AtomicUsize,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_object(key: &str, bytes: Vec<u8>) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes);
            store
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn upload(
            &self,
            bytes: &[u8],
            key: &str,
            _mime: &str,
        ) -> Result<String, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
            Ok(key.to_string())
        }

        async fn fetch(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .get(uri)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(uri.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
