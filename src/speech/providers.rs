//! Contracts for the external speech services
//!
//! Vendor SDKs and HTTP endpoints live behind these traits; the panel only
//! ever talks to them through the runtime in `integration::panel`.

use crate::speech::recognition::RecognizeData;
use crate::{MurmurError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

/// Which service a bearer token unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenService {
    SpeechToText,
    TextToSpeech,
}

impl std::fmt::Display for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenService::SpeechToText => write!(f, "speech-to-text"),
            TokenService::TextToSpeech => write!(f, "text-to-speech"),
        }
    }
}

/// Session-scoped bearer tokens; an absent token disables its feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub stt: Option<String>,
    pub tts: Option<String>,
}

impl Tokens {
    pub fn new(stt: Option<String>, tts: Option<String>) -> Self {
        Self {
            stt: stt.filter(|t| !t.is_empty()),
            tts: tts.filter(|t| !t.is_empty()),
        }
    }

    pub fn get(&self, service: TokenService) -> Option<&str> {
        match service {
            TokenService::SpeechToText => self.stt.as_deref(),
            TokenService::TextToSpeech => self.tts.as_deref(),
        }
    }

    pub fn set(&mut self, service: TokenService, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        match service {
            TokenService::SpeechToText => self.stt = token,
            TokenService::TextToSpeech => self.tts = token,
        }
    }
}

/// Fetches the bearer tokens once at startup
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self, service: TokenService) -> Result<String>;
}

/// Event produced by an open recognition stream
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizeEvent {
    Data(RecognizeData),
    Error(String),
}

/// An open microphone recognition stream.
///
/// `stop` runs the provider's stop hook; dropping without stopping just
/// stops polling.
pub struct RecognitionStream {
    events: BoxStream<'static, RecognizeEvent>,
    on_stop: Option<Box<dyn FnOnce() + Send>>,
}

impl RecognitionStream {
    pub fn new(events: impl Stream<Item = RecognizeEvent> + Send + 'static) -> Self {
        Self {
            events: events.boxed(),
            on_stop: None,
        }
    }

    /// Attach the provider's stop hook
    pub fn with_stop(mut self, on_stop: impl FnOnce() + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(on_stop));
        self
    }

    /// Next event, or `None` once the provider closed the stream
    pub async fn next_event(&mut self) -> Option<RecognizeEvent> {
        self.events.next().await
    }

    pub fn stop(mut self) {
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }
    }
}

impl std::fmt::Debug for RecognitionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionStream")
            .field("stoppable", &self.on_stop.is_some())
            .finish()
    }
}

/// Continuous microphone recognition
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Open a stream for `model` with word confidences enabled
    async fn open_stream(&self, token: &str, model: &str) -> Result<RecognitionStream>;
}

/// One synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub token: String,
}

/// A playing synthesized utterance
#[async_trait]
pub trait PlaybackHandle: Send {
    /// Resolves when playback ends; an `error` event resolves to `Err`
    async fn finished(&mut self) -> Result<()>;

    /// Remove the audio element
    fn dispose(self: Box<Self>);
}

/// Speech synthesis
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Box<dyn PlaybackHandle>>;
}

/// Text translation between two language codes
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String>;
}

/// Stand-in for hosts without speech services; every call fails, which
/// leaves the voice features disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl TokenProvider for Unavailable {
    async fn fetch(&self, service: TokenService) -> Result<String> {
        Err(MurmurError::TokenError(format!("{} is not configured", service)))
    }
}

#[async_trait]
impl SpeechToText for Unavailable {
    async fn open_stream(&self, _token: &str, _model: &str) -> Result<RecognitionStream> {
        Err(MurmurError::RecognitionError("speech-to-text is not configured".into()))
    }
}

#[async_trait]
impl TextToSpeech for Unavailable {
    async fn synthesize(&self, _request: SynthesisRequest) -> Result<Box<dyn PlaybackHandle>> {
        Err(MurmurError::SynthesisError("text-to-speech is not configured".into()))
    }
}

#[async_trait]
impl Translator for Unavailable {
    async fn translate(&self, _source: &str, _target: &str, _text: &str) -> Result<String> {
        Err(MurmurError::TranslationError("translation is not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_tokens_are_absent() {
        let tokens = Tokens::new(Some(String::new()), Some("abc".into()));
        assert_eq!(tokens.get(TokenService::SpeechToText), None);
        assert_eq!(tokens.get(TokenService::TextToSpeech), Some("abc"));
    }

    #[test]
    fn test_token_set() {
        let mut tokens = Tokens::default();
        tokens.set(TokenService::SpeechToText, Some("stt".into()));
        assert_eq!(tokens.stt.as_deref(), Some("stt"));
        tokens.set(TokenService::SpeechToText, Some(String::new()));
        assert_eq!(tokens.stt, None);
    }

    #[tokio::test]
    async fn test_stream_yields_then_stops() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let mut stream = RecognitionStream::new(futures::stream::iter(vec![
            RecognizeEvent::Error("mic".into()),
        ]))
        .with_stop(move || flag.store(true, Ordering::SeqCst));

        assert_eq!(stream.next_event().await, Some(RecognizeEvent::Error("mic".into())));
        assert_eq!(stream.next_event().await, None);

        stream.stop();
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let token = Unavailable.fetch(TokenService::TextToSpeech).await;
        assert!(matches!(token, Err(MurmurError::TokenError(_))));
        assert!(Unavailable.translate("en", "fr", "hi").await.is_err());
        assert!(Unavailable.open_stream("t", "m").await.is_err());
    }
}
