//! Environment-driven configuration.
//!
//! All settings come from `CASTY_*` variables (a `.env` file is honored by
//! the binary). Only the collaborator endpoints and API key are required;
//! everything else has a workable default.

use crate::pipeline::VoiceDefaults;
use crate::pipeline::export::DEFAULT_SYNTHESIS_CONCURRENCY;
use secrecy::SecretString;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cloud_tts_url: String,
    pub cloud_tts_backup_url: Option<String>,
    pub cloning_tts_url: String,
    pub asr_url: String,
    pub api_key: SecretString,
    /// Remote storage service; unset means the local directory store.
    pub storage_url: Option<String>,
    pub storage_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_max_age_days: u64,
    pub voices: VoiceDefaults,
    pub language: String,
    pub synthesis_concurrency: usize,
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(var) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
            var,
            value,
        }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let cloud_tts_url = required("CASTY_CLOUD_TTS_URL")?;
        let asr_url = optional("CASTY_ASR_URL").unwrap_or_else(|| cloud_tts_url.clone());

        let mut voices = VoiceDefaults::default();
        if let Some(preset) = optional("CASTY_USER_VOICE") {
            voices.user_preset = preset;
        }
        if let Some(preset) = optional("CASTY_CHARACTER_VOICE") {
            voices.character_preset = preset;
        }
        if let Some(preset) = optional("CASTY_HOST_VOICE") {
            voices.host_preset = preset;
        }

        Ok(Self {
            cloud_tts_backup_url: optional("CASTY_CLOUD_TTS_BACKUP_URL"),
            cloning_tts_url: required("CASTY_CLONING_TTS_URL")?,
            asr_url,
            api_key: SecretString::from(required("CASTY_TTS_API_KEY")?),
            storage_url: optional("CASTY_STORAGE_URL"),
            storage_dir: PathBuf::from(
                optional("CASTY_STORAGE_DIR").unwrap_or_else(|| "storage".to_string()),
            ),
            cache_dir: PathBuf::from(
                optional("CASTY_CACHE_DIR").unwrap_or_else(|| "tts_cache".to_string()),
            ),
            cache_max_age_days: parsed("CASTY_CACHE_MAX_AGE_DAYS", 30)?,
            language: optional("CASTY_LANGUAGE").unwrap_or_else(|| "en".to_string()),
            synthesis_concurrency: parsed(
                "CASTY_SYNTHESIS_CONCURRENCY",
                DEFAULT_SYNTHESIS_CONCURRENCY,
            )?,
            voices,
            cloud_tts_url,
        })
    }
}
