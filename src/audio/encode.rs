//! Encode pipeline clips to delivery formats.
//!
//! MP3 is the podcast delivery format; WAV is used for reference-audio
//! uploads and tests.

use super::clip::AudioClip;
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};
use std::io::Cursor;
use thiserror::Error;

/// Fixed delivery bitrate.
pub const MP3_BITRATE: Bitrate = Bitrate::Kbps128;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("MP3 encoder setup failed: {0}")]
    Mp3Setup(String),
    #[error("MP3 encode failed: {0}")]
    Mp3(String),
    #[error("refusing to encode an empty clip")]
    Empty,
}

/// Encode a clip as an in-memory WAV file.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>, EncodeError> {
    let spec = hound::WavSpec {
        channels: clip.channels(),
        sample_rate: clip.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in clip.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// Encode a mono clip as MP3 at the fixed delivery bitrate.
pub fn encode_mp3(clip: &AudioClip) -> Result<Vec<u8>, EncodeError> {
    if clip.is_empty() {
        return Err(EncodeError::Empty);
    }
    debug_assert_eq!(clip.channels(), 1, "delivery encode expects mono input");

    let mut builder = Builder::new().ok_or_else(|| {
        EncodeError::Mp3Setup("failed to allocate LAME context".to_string())
    })?;
    builder
        .set_num_channels(1)
        .map_err(|e| EncodeError::Mp3Setup(e.to_string()))?;
    builder
        .set_sample_rate(clip.sample_rate())
        .map_err(|e| EncodeError::Mp3Setup(e.to_string()))?;
    builder
        .set_brate(MP3_BITRATE)
        .map_err(|e| EncodeError::Mp3Setup(e.to_string()))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| EncodeError::Mp3Setup(e.to_string()))?;
    let mut encoder = builder
        .build()
        .map_err(|e| EncodeError::Mp3Setup(e.to_string()))?;

    let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(
        clip.samples().len(),
    ));
    encoder
        .encode_to_vec(MonoPcm(clip.samples()), &mut out)
        .map_err(|e| EncodeError::Mp3(e.to_string()))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| EncodeError::Mp3(e.to_string()))?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wav_bytes_header() {
        let clip = AudioClip::mono(vec![0, 100, -100]);
        let wav = encode_wav(&clip).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
    }

    #[test]
    fn test_mp3_encode_produces_frames() {
        let clip = AudioClip::silence(Duration::from_millis(1000));
        let mp3 = encode_mp3(&clip).unwrap();
        assert!(mp3.len() > 100);
    }

    #[test]
    fn test_mp3_rejects_empty_clip() {
        let clip = AudioClip::empty();
        assert!(matches!(encode_mp3(&clip), Err(EncodeError::Empty)));
    }
}
