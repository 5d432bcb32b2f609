//! Ordered track assembly with cross-clip volume balancing.
//!
//! Distinct from per-clip normalization: this stage corrects the *relative*
//! level between speakers across the whole timeline, then concatenates
//! strictly in input order. The assembler never reorders or drops an entry.

use crate::audio::clip::AudioClip;
use crate::audio::dsp;
use std::time::Duration;
use tracing::debug;

/// Silence inserted between consecutive message clips.
pub const MESSAGE_GAP: Duration = Duration::from_millis(500);

/// Balancing deltas are clamped to this magnitude.
pub const BALANCE_CLAMP_DB: f32 = 10.0;

/// Deltas below this are skipped; micro-adjustments on already-similar clips
/// produce audible pumping.
pub const BALANCE_DEADBAND_DB: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Voice,
    Pause,
}

/// One timeline slot: a clip plus whether it is a pause marker.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub clip: AudioClip,
    pub kind: EntryKind,
}

impl TimelineEntry {
    pub fn voice(clip: AudioClip) -> Self {
        Self {
            clip,
            kind: EntryKind::Voice,
        }
    }

    /// The standard inter-message gap.
    pub fn pause() -> Self {
        Self {
            clip: AudioClip::silence(MESSAGE_GAP),
            kind: EntryKind::Pause,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineAssembler;

impl TimelineAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Balance and concatenate entries, strictly in input order. Total output
    /// duration equals the sum of entry durations. With zero non-silent voice
    /// clips the first entry is returned unchanged rather than failing.
    pub fn assemble(&self, mut entries: Vec<TimelineEntry>) -> AudioClip {
        if entries.is_empty() {
            return AudioClip::empty();
        }

        let levels: Vec<f32> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Voice)
            .map(|e| e.clip.dbfs())
            .filter(|db| *db != f32::NEG_INFINITY)
            .collect();

        if levels.is_empty() {
            // Degenerate all-silence timeline.
            return entries.swap_remove(0).clip;
        }

        let mean = levels.iter().sum::<f32>() / levels.len() as f32;
        debug!(
            clips = levels.len(),
            mean_dbfs = mean,
            "balancing timeline loudness"
        );

        let mut adjusted = 0usize;
        for entry in &mut entries {
            if entry.kind != EntryKind::Voice {
                continue;
            }
            let level = entry.clip.dbfs();
            if level == f32::NEG_INFINITY {
                continue;
            }
            let delta = (mean - level).clamp(-BALANCE_CLAMP_DB, BALANCE_CLAMP_DB);
            if delta.abs() > BALANCE_DEADBAND_DB {
                dsp::apply_gain(&mut entry.clip, delta);
                adjusted += 1;
            }
        }
        if adjusted > 0 {
            debug!(adjusted, "applied cross-clip gain corrections");
        }

        let clips: Vec<AudioClip> = entries.into_iter().map(|e| e.clip).collect();
        dsp::concat(&clips)
    }
}
