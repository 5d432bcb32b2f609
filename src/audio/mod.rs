pub mod clip;
pub mod decode;
pub mod dsp;
pub mod encode;
pub mod tone;

pub use clip::{AudioClip, PIPELINE_SAMPLE_RATE};
pub use decode::{DecodeError, decode_bytes, decode_to_pipeline};
pub use encode::{EncodeError, encode_mp3, encode_wav};
