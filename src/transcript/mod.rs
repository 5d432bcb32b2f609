//! Typed chat-transcript domain model.
//!
//! The data provider hands over JSON; this module is the single boundary that
//! parses it. Both snake_case and camelCase field spellings are accepted here
//! and nowhere else; the pipeline only ever sees the typed structs.

use serde::{Deserialize, Serialize};

/// One chat message, in timeline order within a [`Transcript`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message text to be spoken.
    pub content: String,
    /// True for the human side of the conversation.
    #[serde(default, alias = "isUser")]
    pub is_user: bool,
    /// URI of already-rendered audio for this message, if any.
    #[serde(
        default,
        alias = "audioUrl",
        alias = "audio_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_ref: Option<String>,
}

impl Message {
    pub fn role(&self) -> SpeakerRole {
        if self.is_user {
            SpeakerRole::User
        } else {
            SpeakerRole::Ai
        }
    }
}

/// Ordered conversation transcript. Order is the timeline order of the
/// rendered podcast and is preserved through every pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        // Providers send either a bare message array or a wrapped object.
        if let Ok(messages) = serde_json::from_str::<Vec<Message>>(json) {
            return Ok(Self { messages });
        }
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Which side of the conversation a clip belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerRole {
    User,
    Ai,
}

/// Read-only character snapshot for one export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    /// Reference audio for voice cloning, if the character has one.
    #[serde(default, alias = "referenceAudioUri", alias = "reference_audio_path")]
    pub reference_audio_uri: Option<String>,
    /// Transcript of the reference audio. Missing text is obtained lazily
    /// via ASR during the export.
    #[serde(default, alias = "referenceText", alias = "reference_audio_text")]
    pub reference_text: Option<String>,
    #[serde(
        default,
        alias = "referenceLanguage",
        alias = "reference_audio_language"
    )]
    pub reference_language: Option<String>,
}

/// How a speaker's lines are rendered to audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSpec {
    /// A preset voice of the cloud TTS service.
    CloudPreset { voice_id: String },
    /// Voice cloning conditioned on a reference sample.
    Cloned {
        reference_audio_uri: String,
        reference_text: Option<String>,
        reference_language: String,
    },
    /// No explicit choice; the source falls back to a configured preset.
    DefaultFallback,
}

impl VoiceSpec {
    /// Derive the character's voice from its record: cloning when a reference
    /// sample exists, the default preset otherwise.
    pub fn for_character(character: &Character) -> Self {
        match &character.reference_audio_uri {
            Some(uri) => VoiceSpec::Cloned {
                reference_audio_uri: uri.clone(),
                reference_text: character.reference_text.clone(),
                reference_language: character
                    .reference_language
                    .clone()
                    .unwrap_or_else(|| "en".to_string()),
            },
            None => VoiceSpec::DefaultFallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accepts_both_spellings() {
        let snake: Message = serde_json::from_str(
            r#"{"content": "hi", "is_user": true, "audio_url": "a/b.mp3"}"#,
        )
        .unwrap();
        let camel: Message =
            serde_json::from_str(r#"{"content": "hi", "isUser": true, "audioUrl": "a/b.mp3"}"#)
                .unwrap();

        assert!(snake.is_user);
        assert!(camel.is_user);
        assert_eq!(snake.audio_ref.as_deref(), Some("a/b.mp3"));
        assert_eq!(camel.audio_ref.as_deref(), Some("a/b.mp3"));
    }

    #[test]
    fn test_missing_flags_default_to_ai_message() {
        let msg: Message = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert!(!msg.is_user);
        assert_eq!(msg.role(), SpeakerRole::Ai);
        assert!(msg.audio_ref.is_none());
    }

    #[test]
    fn test_transcript_from_bare_array() {
        let t = Transcript::from_json(r#"[{"content": "a"}, {"content": "b", "isUser": true}]"#)
            .unwrap();
        assert_eq!(t.len(), 2);
        assert!(t.messages[1].is_user);
    }

    #[test]
    fn test_voice_spec_for_character() {
        let with_ref = Character {
            id: "c1".to_string(),
            name: "Mira".to_string(),
            reference_audio_uri: Some("voices/mira.wav".to_string()),
            reference_text: None,
            reference_language: None,
        };
        match VoiceSpec::for_character(&with_ref) {
            VoiceSpec::Cloned {
                reference_audio_uri,
                reference_text,
                reference_language,
            } => {
                assert_eq!(reference_audio_uri, "voices/mira.wav");
                assert!(reference_text.is_none());
                assert_eq!(reference_language, "en");
            }
            other => panic!("expected cloned spec, got {:?}", other),
        }

        let without_ref = Character {
            id: "c2".to_string(),
            name: "Basic".to_string(),
            reference_audio_uri: None,
            reference_text: None,
            reference_language: None,
        };
        assert_eq!(
            VoiceSpec::for_character(&without_ref),
            VoiceSpec::DefaultFallback
        );
    }
}
