//! casty renders chat transcripts into podcast audio.
//!
//! A transcript is resolved message by message into decoded clips (cloud TTS,
//! voice cloning, cached synthesis, or a deterministic fallback tone),
//! normalized, assembled into one gapped and volume-balanced timeline,
//! bookended with host-voice intro/outro lines, optionally mixed with
//! background music, and encoded to a single MP3 buffer.

pub mod audio;
pub mod cache;
pub mod config;
pub mod pipeline;
pub mod speech;
pub mod storage;
pub mod transcript;

pub use config::Config;
pub use pipeline::{
    ExportError, ExportJob, ExportOptions, PodcastExporter, UserVoiceChoice, VoiceDefaults,
};
pub use transcript::{Character, Message, Transcript};
