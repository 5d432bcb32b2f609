//! Sample-level operators the pipeline stages compose.
//!
//! All functions assume clips share the pipeline rate unless noted; callers
//! standardize at decode time.

use super::clip::AudioClip;
use std::time::Duration;

/// Convert a decibel delta to a linear amplitude ratio.
pub fn db_to_ratio(db: f32) -> f64 {
    10f64.powf(db as f64 / 20.0)
}

/// Convert an amplitude ratio to decibels.
pub fn ratio_to_db(ratio: f64) -> f32 {
    (20.0 * ratio.log10()) as f32
}

/// Apply a gain in dB, clamping at full scale.
pub fn apply_gain(clip: &mut AudioClip, db: f32) {
    if db == 0.0 {
        return;
    }
    let ratio = db_to_ratio(db);
    for s in clip.samples_mut().iter_mut() {
        let scaled = (*s as f64 * ratio).round();
        *s = scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }
}

/// Peak-normalize so the loudest sample lands `headroom_db` below full scale.
/// Silent clips pass through unchanged.
pub fn normalize_peak(clip: &mut AudioClip, headroom_db: f32) {
    let peak = clip.peak_dbfs();
    if peak == f32::NEG_INFINITY {
        return;
    }
    apply_gain(clip, -headroom_db - peak);
}

/// Downmix interleaved stereo to mono by channel averaging.
pub fn downmix_mono(clip: &AudioClip) -> AudioClip {
    if clip.channels() == 1 {
        return clip.clone();
    }
    let channels = clip.channels() as usize;
    let mono: Vec<i16> = clip
        .samples()
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect();
    AudioClip::new(mono, clip.sample_rate(), 1)
}

/// Linear-interpolation resample of a mono clip.
pub fn resample(clip: &AudioClip, target_rate: u32) -> AudioClip {
    debug_assert_eq!(clip.channels(), 1, "resample expects mono input");
    if clip.sample_rate() == target_rate || clip.is_empty() {
        return AudioClip::new(clip.samples().to_vec(), target_rate, 1);
    }

    let src = clip.samples();
    let ratio = clip.sample_rate() as f64 / target_rate as f64;
    let out_len = (src.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = src[idx.min(src.len() - 1)] as f64;
        let b = src[(idx + 1).min(src.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    AudioClip::new(out, target_rate, 1)
}

/// Concatenate clips in order. Inputs must share rate and channel count.
pub fn concat(clips: &[AudioClip]) -> AudioClip {
    let first = match clips.iter().find(|c| !c.is_empty()) {
        Some(c) => c,
        None => return AudioClip::empty(),
    };
    let total: usize = clips.iter().map(|c| c.samples().len()).sum();
    let mut samples = Vec::with_capacity(total);
    for clip in clips {
        samples.extend_from_slice(clip.samples());
    }
    AudioClip::new(samples, first.sample_rate(), first.channels())
}

/// Pad the end with silence up to `min_duration`. No-op for longer clips.
pub fn pad_to_min_duration(clip: &mut AudioClip, min_duration: Duration) {
    let min_frames =
        (clip.sample_rate() as u128 * min_duration.as_millis() / 1000) as usize * clip.channels() as usize;
    if clip.samples().len() < min_frames {
        clip.samples_mut().resize(min_frames, 0);
    }
}

/// Additive overlay of `layer` onto `base`, clamped to full scale. The result
/// keeps `base`'s length; excess `layer` samples are dropped.
pub fn overlay(base: &AudioClip, layer: &AudioClip) -> AudioClip {
    let mut samples: Vec<i16> = base.samples().to_vec();
    for (out, &add) in samples.iter_mut().zip(layer.samples()) {
        let mixed = *out as i32 + add as i32;
        *out = mixed.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
    AudioClip::new(samples, base.sample_rate(), base.channels())
}

/// Tile a clip end-to-end until it covers `target`, then truncate exactly.
pub fn tile_to_duration(clip: &AudioClip, target: Duration) -> AudioClip {
    let target_frames =
        (clip.sample_rate() as u128 * target.as_millis() / 1000) as usize * clip.channels() as usize;
    if clip.is_empty() || target_frames == 0 {
        return AudioClip::new(Vec::new(), clip.sample_rate(), clip.channels());
    }
    let mut samples = Vec::with_capacity(target_frames);
    while samples.len() < target_frames {
        let remaining = target_frames - samples.len();
        let take = remaining.min(clip.samples().len());
        samples.extend_from_slice(&clip.samples()[..take]);
    }
    AudioClip::new(samples, clip.sample_rate(), clip.channels())
}

/// Linear fade-in over the leading `duration`.
pub fn fade_in(clip: &mut AudioClip, duration: Duration) {
    let frames = fade_frames(clip, duration);
    if frames == 0 {
        return;
    }
    for (i, s) in clip.samples_mut().iter_mut().take(frames).enumerate() {
        let g = i as f64 / frames as f64;
        *s = (*s as f64 * g) as i16;
    }
}

/// Linear fade-out over the trailing `duration`.
pub fn fade_out(clip: &mut AudioClip, duration: Duration) {
    let frames = fade_frames(clip, duration);
    if frames == 0 {
        return;
    }
    let len = clip.samples().len();
    for (i, s) in clip.samples_mut().iter_mut().skip(len - frames).enumerate() {
        let g = 1.0 - i as f64 / frames as f64;
        *s = (*s as f64 * g) as i16;
    }
}

fn fade_frames(clip: &AudioClip, duration: Duration) -> usize {
    let frames =
        (clip.sample_rate() as u128 * duration.as_millis() / 1000) as usize * clip.channels() as usize;
    frames.min(clip.samples().len())
}
