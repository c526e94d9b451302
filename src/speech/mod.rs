//! Speech modules for the microphone and the speaker
//!
//! This module provides:
//! - Contracts for the speech-to-text, text-to-speech and translation services
//! - The recognition result model and live transcript region
//! - The voice turn controller

pub mod providers;
pub mod recognition;
pub mod voice;

// Re-export commonly used types
pub use providers::{
    PlaybackHandle, RecognitionStream, RecognizeEvent, SpeechToText, SynthesisRequest,
    TextToSpeech, TokenProvider, TokenService, Tokens, Translator, Unavailable,
};
pub use recognition::{LiveRegion, RecognizeData, Sentence, AUTO_SUBMIT_CONFIDENCE};
pub use voice::{
    UtteranceOrder, VoiceCommand, VoiceEvent, VoiceSettings, VoiceState, VoiceStatus,
    VoiceTurnController,
};
