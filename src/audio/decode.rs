//! Decode encoded audio bytes into pipeline clips.
//!
//! Collaborators deliver wav/mp3/ogg/flac depending on the service; symphonia
//! probes the container so the pipeline never has to know which.

use super::clip::{AudioClip, PIPELINE_SAMPLE_RATE};
use super::dsp;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unrecognized audio container: {0}")]
    UnknownFormat(String),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("decoded stream was empty")]
    Empty,
}

/// Decode arbitrary encoded bytes to interleaved PCM at the source rate.
pub fn decode_bytes(bytes: &[u8]) -> Result<AudioClip, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnknownFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let mut samples: Vec<i16> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(PIPELINE_SAMPLE_RATE);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Malformed packets are recoverable; skip them.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(AudioClip::new(samples, sample_rate, channels))
}

/// Decode and standardize to mono at the pipeline rate.
pub fn decode_to_pipeline(bytes: &[u8]) -> Result<AudioClip, DecodeError> {
    let clip = decode_bytes(bytes)?;
    let mono = dsp::downmix_mono(&clip);
    Ok(dsp::resample(&mono, PIPELINE_SAMPLE_RATE))
}
