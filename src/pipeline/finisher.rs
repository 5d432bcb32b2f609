//! Final track assembly: bookends, background music, mastering, encode.
//!
//! Intro and outro lines are always rendered through the cloud-preset "host"
//! voice, never the cloned or user voice, so every export opens and closes
//! with the same sound regardless of which voices the conversation used.

use super::normalizer::ClipNormalizer;
use super::ExportError;
use crate::audio::clip::AudioClip;
use crate::audio::{dsp, decode, encode};
use crate::speech::CloudTts;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background music is ducked by this much before the overlay.
pub const MUSIC_ATTENUATION_DB: f32 = -10.0;

/// Upper bound on the fade length; short tracks fade over a tenth of their
/// length instead.
pub const MAX_FADE: Duration = Duration::from_millis(1000);

/// Peak headroom of the final mastering pass.
const MASTER_HEADROOM_DB: f32 = 1.0;

pub struct TrackFinisher {
    cloud: Arc<dyn CloudTts>,
    host_voice: String,
    normalizer: ClipNormalizer,
}

impl TrackFinisher {
    pub fn new(cloud: Arc<dyn CloudTts>, host_voice: String) -> Self {
        Self {
            cloud,
            host_voice,
            normalizer: ClipNormalizer::new(),
        }
    }

    /// Wrap the assembled body with intro/outro, mix optional background
    /// music, master, and encode to MP3. The only fatal outcomes are an empty
    /// final track and an encoder failure.
    pub async fn finish(
        &self,
        body: AudioClip,
        intro_text: &str,
        outro_text: &str,
        background_music: Option<&[u8]>,
    ) -> Result<Vec<u8>, ExportError> {
        let intro = self.render_bookend(intro_text, "intro").await;
        let outro = self.render_bookend(outro_text, "outro").await;

        let mut parts = Vec::with_capacity(3);
        if let Some(clip) = intro {
            parts.push(clip);
        }
        parts.push(body);
        if let Some(clip) = outro {
            parts.push(clip);
        }
        let mut track = dsp::concat(&parts);

        if track.is_empty() {
            return Err(ExportError::NoAudio);
        }

        if let Some(music_bytes) = background_music {
            track = self.mix_background_music(track, music_bytes);
        }

        let fade = Duration::from_millis((track.duration_ms() / 10).min(MAX_FADE.as_millis() as u64));
        dsp::fade_in(&mut track, fade);
        dsp::fade_out(&mut track, fade);
        dsp::normalize_peak(&mut track, MASTER_HEADROOM_DB);

        let bytes = encode::encode_mp3(&track)?;
        info!(
            duration_ms = track.duration_ms(),
            bytes = bytes.len(),
            "podcast track encoded"
        );
        Ok(bytes)
    }

    /// Render one bookend line through the host voice. Empty text means no
    /// bookend; a render failure is logged and skipped.
    async fn render_bookend(&self, text: &str, which: &str) -> Option<AudioClip> {
        if text.trim().is_empty() {
            return None;
        }

        let bytes = match self.cloud.synthesize(text, &self.host_voice, 1.0).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{} synthesis failed, skipping: {}", which, e);
                return None;
            }
        };

        match decode::decode_to_pipeline(&bytes) {
            Ok(clip) => Some(self.normalizer.normalize(clip)),
            Err(e) => {
                warn!("{} audio unreadable, skipping: {}", which, e);
                None
            }
        }
    }

    /// Loop the music to cover the track, duck it, and mix additively. Music
    /// is cosmetic: any failure returns the track unmixed.
    fn mix_background_music(&self, track: AudioClip, music_bytes: &[u8]) -> AudioClip {
        let music = match decode::decode_to_pipeline(music_bytes) {
            Ok(clip) if !clip.is_empty() => clip,
            Ok(_) => {
                warn!("background music decoded to nothing, skipping overlay");
                return track;
            }
            Err(e) => {
                warn!("background music unreadable, skipping overlay: {}", e);
                return track;
            }
        };

        let target = Duration::from_millis(track.duration_ms());
        let mut bed = dsp::tile_to_duration(&music, target);
        dsp::apply_gain(&mut bed, MUSIC_ATTENUATION_DB);
        let mixed = dsp::overlay(&track, &bed);
        debug!(
            music_ms = music.duration_ms(),
            track_ms = track.duration_ms(),
            "background music mixed"
        );
        mixed
    }
}
