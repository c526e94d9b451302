pub mod api;
pub mod integration;
pub mod messages;
pub mod playback;
pub mod speech;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MurmurError {
    #[error("Payload error: {0}")]
    PayloadError(String),

    #[error("Assistant error: {0}")]
    AssistantError(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Translation error: {0}")]
    TranslationError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("Recognition error: {0}")]
    RecognitionError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for MurmurError {
    fn from(e: std::io::Error) -> Self {
        MurmurError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(e: serde_json::Error) -> Self {
        MurmurError::PayloadError(e.to_string())
    }
}

impl MurmurError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A bad payload only loses that one message
            MurmurError::PayloadError(_) => true,
            // Service failures abandon one action; the user can re-trigger it
            MurmurError::AssistantError(_) => true,
            MurmurError::TranslationError(_) => true,
            MurmurError::SynthesisError(_) => true,
            MurmurError::RecognitionError(_) => true,
            // Tokens are fetched once per session
            MurmurError::TokenError(_) => false,
            MurmurError::IOError(_) => false,
            MurmurError::ConfigError(_) => false,
            MurmurError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            MurmurError::PayloadError(_) => {
                "A message could not be displayed.".to_string()
            }
            MurmurError::AssistantError(_) => {
                "The assistant could not be reached. Please send your message again.".to_string()
            }
            MurmurError::TokenError(_) => {
                "Voice features are unavailable for this session.".to_string()
            }
            MurmurError::TranslationError(_) => {
                "Translation failed. Please try again.".to_string()
            }
            MurmurError::SynthesisError(_) => {
                "Text-to-speech failed. Responses will be shown as text.".to_string()
            }
            MurmurError::RecognitionError(_) => {
                "Speech recognition failed. Please restart the microphone.".to_string()
            }
            MurmurError::IOError(_) => "File system error occurred.".to_string(),
            MurmurError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            MurmurError::ChannelError(_) => {
                "Internal communication error. Please reload the panel.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failures_are_recoverable() {
        assert!(MurmurError::TranslationError("timeout".into()).is_recoverable());
        assert!(MurmurError::SynthesisError("no audio".into()).is_recoverable());
        assert!(!MurmurError::TokenError("401".into()).is_recoverable());
    }

    #[test]
    fn test_json_error_maps_to_payload() {
        let err: MurmurError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, MurmurError::PayloadError(_)));
        assert!(err.to_string().starts_with("Payload error"));
    }
}
