//! Deterministic placeholder tone synthesis.
//!
//! The last resort of the clip fallback chain: when every real synthesis
//! strategy fails, a short sine tone stands in so the export never loses a
//! message slot. Frequency and duration derive only from the speaker role and
//! the text length, so repeated runs produce identical audio.

use super::clip::{AudioClip, PIPELINE_SAMPLE_RATE};
use crate::transcript::SpeakerRole;
use std::f64::consts::TAU;

/// Base frequency per speaker role, Hz.
const USER_BASE_HZ: f64 = 330.0;
const AI_BASE_HZ: f64 = 440.0;

/// Tone amplitude relative to full scale.
const AMPLITUDE: f64 = 0.3;

/// Duration bounds in milliseconds.
const MIN_TONE_MS: u64 = 400;
const MAX_TONE_MS: u64 = 3_000;

/// Frequency of the placeholder tone for a role and text length.
pub fn placeholder_frequency(role: SpeakerRole, text_len: usize) -> f64 {
    let base = match role {
        SpeakerRole::User => USER_BASE_HZ,
        SpeakerRole::Ai => AI_BASE_HZ,
    };
    base + (text_len % 40) as f64 * 10.0
}

/// Duration of the placeholder tone for a text length, roughly tracking how
/// long the spoken line would have been.
pub fn placeholder_duration_ms(text_len: usize) -> u64 {
    (MIN_TONE_MS + 40 * text_len as u64).min(MAX_TONE_MS)
}

/// Synthesize the placeholder clip for one unresolved message.
pub fn placeholder_tone(role: SpeakerRole, text_len: usize) -> AudioClip {
    let freq = placeholder_frequency(role, text_len);
    let duration_ms = placeholder_duration_ms(text_len);
    sine(freq, duration_ms)
}

/// Plain sine clip, mono at the pipeline rate.
pub fn sine(freq_hz: f64, duration_ms: u64) -> AudioClip {
    let frames = (PIPELINE_SAMPLE_RATE as u64 * duration_ms / 1000) as usize;
    let samples: Vec<i16> = (0..frames)
        .map(|i| {
            let t = i as f64 / PIPELINE_SAMPLE_RATE as f64;
            ((t * freq_hz * TAU).sin() * AMPLITUDE * i16::MAX as f64) as i16
        })
        .collect();
    AudioClip::mono(samples)
}
