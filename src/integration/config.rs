//! Configuration for the conversation panel
//!
//! Provides centralized configuration for all components.

use crate::messages::format::DEFAULT_IMAGE_WIDTH;
use crate::playback::DEFAULT_TYPING_LABEL;
use crate::speech::recognition::AUTO_SUBMIT_CONFIDENCE;
use crate::speech::voice::{UtteranceOrder, VoiceSettings};
use serde::Deserialize;

/// Configuration for the complete panel
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Assistant workspace to converse with (service default when unset)
    pub workspace_id: Option<String>,

    /// Language the assistant converses in
    pub assistant_lang: String,

    /// Speech-to-text model used for the microphone
    pub listen_voice: String,

    /// Text-to-speech voice used for the speaker
    pub say_voice: String,

    /// Transcripts above this confidence are sent without review
    pub auto_submit_confidence: f64,

    /// Display width of image responses, in pixels
    pub image_width: u32,

    /// Typing indicator text shown during pauses
    pub typing_label: String,

    /// Which queued utterance is spoken next; oldest first unless set to
    /// `LatestFirst`
    pub utterance_order: UtteranceOrder,

    /// Whether the speaker starts unmuted
    pub speech_output_enabled: bool,

    /// Capacity of the outbound UI event channel
    pub channel_buffer_size: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        let voice = VoiceSettings::default();
        Self {
            workspace_id: None,
            assistant_lang: voice.assistant_lang,
            listen_voice: voice.listen_voice,
            say_voice: voice.say_voice,
            auto_submit_confidence: AUTO_SUBMIT_CONFIDENCE,
            image_width: DEFAULT_IMAGE_WIDTH,
            typing_label: DEFAULT_TYPING_LABEL.to_string(),
            utterance_order: UtteranceOrder::Fifo,
            speech_output_enabled: false,
            channel_buffer_size: 100,
        }
    }
}

impl PanelConfig {
    /// Create a configuration for a workspace and assistant language
    pub fn new(workspace_id: Option<String>, assistant_lang: Option<String>) -> Self {
        let mut config = Self::default();
        config.workspace_id = workspace_id;
        if let Some(lang) = assistant_lang {
            config.assistant_lang = lang;
        }
        config
    }

    /// Load a configuration from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the workspace
    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Set the assistant language
    pub fn with_assistant_lang(mut self, lang: impl Into<String>) -> Self {
        self.assistant_lang = lang.into();
        self
    }

    /// Set the recognition model
    pub fn with_listen_voice(mut self, voice: impl Into<String>) -> Self {
        self.listen_voice = voice.into();
        self
    }

    /// Set the synthesis voice
    pub fn with_say_voice(mut self, voice: impl Into<String>) -> Self {
        self.say_voice = voice.into();
        self
    }

    /// Set the utterance order
    pub fn with_utterance_order(mut self, order: UtteranceOrder) -> Self {
        self.utterance_order = order;
        self
    }

    /// Start with the speaker unmuted
    pub fn with_speech_output(mut self) -> Self {
        self.speech_output_enabled = true;
        self
    }

    /// Voice settings derived from this configuration
    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            assistant_lang: self.assistant_lang.clone(),
            listen_voice: self.listen_voice.clone(),
            say_voice: self.say_voice.clone(),
            auto_submit_confidence: self.auto_submit_confidence,
            utterance_order: self.utterance_order,
            speech_output_enabled: self.speech_output_enabled,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.assistant_lang.chars().count() != 2 {
            return Err(format!(
                "Assistant language must be a two-letter code: {:?}",
                self.assistant_lang
            ));
        }

        if self.listen_voice.is_empty() || self.say_voice.is_empty() {
            return Err("Listen and say voices are required".to_string());
        }

        if !(0.0..=1.0).contains(&self.auto_submit_confidence) {
            return Err(format!(
                "Auto-submit confidence out of range: {}",
                self.auto_submit_confidence
            ));
        }

        if self.channel_buffer_size == 0 {
            return Err("Channel buffer size must be positive".to_string());
        }

        Ok(())
    }
}
