//! Voice turn-taking between the microphone and the speaker
//!
//! Listening and speaking are mutually exclusive. Whichever starts second
//! stops the other, and an interrupted listening turn resumes once the
//! utterance queue is empty unless the user stopped it meanwhile.
//!
//! The controller performs no I/O. Every operation returns the
//! [`VoiceCommand`]s the runtime must execute, and results come back through
//! [`VoiceTurnController::handle_event`].

use crate::speech::providers::{RecognizeEvent, SynthesisRequest, Tokens};
use crate::speech::recognition::{
    confidence_html, LiveRegion, RecognizeData, Sentence, AUTO_SUBMIT_CONFIDENCE,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which queued utterance is spoken next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceOrder {
    /// Oldest first; spoken order matches rendering order. A newer
    /// utterance never jumps the queue here; use `LatestFirst` for that.
    #[default]
    Fifo,
    /// Newest first; older utterances wait until nothing newer is queued
    LatestFirst,
}

/// Audio turn currently holding the devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
    Speaking,
}

impl std::fmt::Display for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceState::Idle => write!(f, "Idle"),
            VoiceState::Listening => write!(f, "Listening"),
            VoiceState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Snapshot reported to the hosting UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceStatus {
    pub state: VoiceState,
    /// Mic and speaker buttons accept clicks
    pub controls_enabled: bool,
    pub speech_output_enabled: bool,
    /// Listening restarts once speaking ends
    pub resume_pending: bool,
}

/// Voice-related settings
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// Language the assistant converses in
    pub assistant_lang: String,
    /// Recognition model; its first two characters name the spoken language
    pub listen_voice: String,
    /// Synthesis voice; its first two characters name the output language
    pub say_voice: String,
    pub auto_submit_confidence: f64,
    pub utterance_order: UtteranceOrder,
    pub speech_output_enabled: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            assistant_lang: "en".to_string(),
            listen_voice: "en-US_BroadbandModel".to_string(),
            say_voice: "en-US_MichaelVoice".to_string(),
            auto_submit_confidence: AUTO_SUBMIT_CONFIDENCE,
            utterance_order: UtteranceOrder::Fifo,
            speech_output_enabled: false,
        }
    }
}

/// What a translation result is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationPurpose {
    /// Translate an utterance before synthesizing it
    Speak { utterance: Uuid },
    /// Translate a transcript before sending it to the assistant
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJob {
    pub id: Uuid,
    pub source: String,
    pub target: String,
    pub text: String,
    pub purpose: TranslationPurpose,
}

/// Side effects requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    OpenRecognizer {
        session: u64,
        token: String,
        model: String,
    },
    CloseRecognizer {
        session: u64,
    },
    Synthesize {
        utterance: Uuid,
        request: SynthesisRequest,
    },
    Translate(TranslationJob),
    /// Send text to the assistant as a user message
    Submit(String),
    LiveRegionChanged(LiveRegion),
    StatusChanged(VoiceStatus),
}

/// Results fed back by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Recognition {
        session: u64,
        event: RecognizeEvent,
    },
    RecognizerFailed {
        session: u64,
        error: String,
    },
    SpeechEnded {
        utterance: Uuid,
        result: std::result::Result<(), String>,
    },
    Translated {
        job: Uuid,
        result: std::result::Result<String, String>,
    },
}

/// Coordinates microphone and speech synthesis turns
#[derive(Debug)]
pub struct VoiceTurnController {
    settings: VoiceSettings,
    tokens: Tokens,

    /// Open recognizer session, if listening
    session: Option<u64>,
    next_session: u64,

    /// Utterance being translated or played
    speaking: Option<Uuid>,

    /// Listening was active (or requested) when speaking took over
    resume_listening: bool,

    pending: VecDeque<String>,
    output_enabled: bool,

    /// Source language for transcripts, when it differs from the assistant's
    translate_input: Option<String>,
    /// Target language for utterances, when it differs from the assistant's
    translate_output: Option<String>,

    jobs: HashMap<Uuid, TranslationPurpose>,

    live: LiveRegion,
    /// Low-confidence transcript awaiting accept/reject
    review: Option<String>,
}

impl VoiceTurnController {
    pub fn new(settings: VoiceSettings, tokens: Tokens) -> Self {
        let translate_input = foreign_lang(&settings.listen_voice, &settings.assistant_lang);
        let translate_output = foreign_lang(&settings.say_voice, &settings.assistant_lang);
        Self {
            output_enabled: settings.speech_output_enabled,
            settings,
            tokens,
            session: None,
            next_session: 1,
            speaking: None,
            resume_listening: false,
            pending: VecDeque::new(),
            translate_input,
            translate_output,
            jobs: HashMap::new(),
            live: LiveRegion::default(),
            review: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        if self.speaking.is_some() {
            VoiceState::Speaking
        } else if self.session.is_some() {
            VoiceState::Listening
        } else {
            VoiceState::Idle
        }
    }

    pub fn status(&self) -> VoiceStatus {
        VoiceStatus {
            state: self.state(),
            controls_enabled: self.speaking.is_none(),
            speech_output_enabled: self.output_enabled,
            resume_pending: self.resume_listening,
        }
    }

    pub fn live_region(&self) -> &LiveRegion {
        &self.live
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    pub fn pending_utterances(&self) -> usize {
        self.pending.len()
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    pub fn set_tokens(&mut self, tokens: Tokens) {
        self.tokens = tokens;
    }

    /// Open a continuous recognition stream
    pub fn start_listening(&mut self) -> Vec<VoiceCommand> {
        if self.speaking.is_some() {
            debug!("Microphone requested while speaking, deferring");
            self.resume_listening = true;
            return vec![VoiceCommand::StatusChanged(self.status())];
        }

        let Some(token) = self.tokens.stt.clone() else {
            warn!("No speech-to-text token, microphone unavailable");
            return Vec::new();
        };

        let mut commands = self.close_stream();

        let session = self.next_session;
        self.next_session += 1;
        self.session = Some(session);
        self.review = None;
        self.live.reset(true);

        info!("Listening with {} (session {})", self.settings.listen_voice, session);
        commands.push(VoiceCommand::OpenRecognizer {
            session,
            token,
            model: self.settings.listen_voice.clone(),
        });
        commands.push(VoiceCommand::LiveRegionChanged(self.live.clone()));
        commands.push(VoiceCommand::StatusChanged(self.status()));
        commands
    }

    /// Close the recognition stream; while speaking this also cancels the
    /// pending resume
    pub fn stop_listening(&mut self) -> Vec<VoiceCommand> {
        if self.speaking.is_some() && self.resume_listening {
            debug!("Listening disabled while speaking, not resuming");
            self.resume_listening = false;
        }

        let mut commands = self.close_stream();
        self.review = None;
        self.live.reset(false);
        commands.push(VoiceCommand::LiveRegionChanged(self.live.clone()));
        commands.push(VoiceCommand::StatusChanged(self.status()));
        commands
    }

    /// Microphone button behavior
    pub fn toggle_listening(&mut self) -> Vec<VoiceCommand> {
        if self.session.is_some() || (self.speaking.is_some() && self.resume_listening) {
            self.stop_listening()
        } else {
            self.start_listening()
        }
    }

    fn close_stream(&mut self) -> Vec<VoiceCommand> {
        match self.session.take() {
            Some(session) => {
                debug!("Closing recognizer session {}", session);
                vec![VoiceCommand::CloseRecognizer { session }]
            }
            None => Vec::new(),
        }
    }

    /// Queue an utterance and speak it when the speaker is free
    pub fn say(&mut self, text: impl Into<String>) -> Vec<VoiceCommand> {
        let text = text.into();
        if !self.output_enabled {
            debug!("Speech output muted, dropping utterance");
            return Vec::new();
        }
        if self.tokens.tts.is_none() {
            debug!("No text-to-speech token, dropping utterance");
            return Vec::new();
        }

        self.pending.push_back(text);
        self.try_speak()
    }

    fn try_speak(&mut self) -> Vec<VoiceCommand> {
        let mut commands = Vec::new();
        let mut started = false;

        // Utterances that cannot be synthesized are skipped in place
        while self.speaking.is_none() {
            let next = match self.settings.utterance_order {
                UtteranceOrder::Fifo => self.pending.pop_front(),
                UtteranceOrder::LatestFirst => self.pending.pop_back(),
            };
            let Some(text) = next else {
                break;
            };
            started = true;

            let utterance = Uuid::new_v4();
            self.speaking = Some(utterance);

            if self.session.is_some() {
                self.resume_listening = true;
                commands.extend(self.close_stream());
                self.review = None;
                self.live.reset(false);
                commands.push(VoiceCommand::LiveRegionChanged(self.live.clone()));
            }

            match self.translate_output.clone() {
                Some(target) => {
                    let job = TranslationJob {
                        id: Uuid::new_v4(),
                        source: self.settings.assistant_lang.clone(),
                        target,
                        text,
                        purpose: TranslationPurpose::Speak { utterance },
                    };
                    self.jobs.insert(job.id, job.purpose);
                    commands.push(VoiceCommand::Translate(job));
                }
                None => match self.synthesize(utterance, text) {
                    Some(command) => commands.push(command),
                    None => self.speaking = None,
                },
            }
        }

        if !started {
            return commands;
        }

        if self.speaking.is_none() && self.resume_listening {
            self.resume_listening = false;
            commands.extend(self.start_listening());
        }
        commands.push(VoiceCommand::StatusChanged(self.status()));
        commands
    }

    fn synthesize(&self, utterance: Uuid, text: String) -> Option<VoiceCommand> {
        let Some(token) = self.tokens.tts.clone() else {
            warn!("Text-to-speech token disappeared, skipping utterance");
            return None;
        };

        debug!("Speaking {} chars with {}", text.len(), self.settings.say_voice);
        Some(VoiceCommand::Synthesize {
            utterance,
            request: SynthesisRequest {
                text,
                voice: self.settings.say_voice.clone(),
                token,
            },
        })
    }

    fn finish_speaking(&mut self, utterance: Uuid) -> Vec<VoiceCommand> {
        if self.speaking != Some(utterance) {
            debug!("Ignoring end of superseded utterance {}", utterance);
            return Vec::new();
        }
        self.speaking = None;

        let mut commands = self.try_speak();
        if self.speaking.is_none() {
            if self.resume_listening {
                self.resume_listening = false;
                commands.extend(self.start_listening());
            }
            commands.push(VoiceCommand::StatusChanged(self.status()));
        }
        commands
    }

    /// Unmute the speaker; ignored while speaking
    pub fn enable_speech_output(&mut self) -> Vec<VoiceCommand> {
        if self.speaking.is_some() {
            debug!("Speaker toggle ignored while speaking");
            return Vec::new();
        }
        self.output_enabled = true;
        vec![VoiceCommand::StatusChanged(self.status())]
    }

    /// Mute the speaker and drop queued utterances; ignored while speaking
    pub fn mute_speech_output(&mut self) -> Vec<VoiceCommand> {
        if self.speaking.is_some() {
            debug!("Speaker toggle ignored while speaking");
            return Vec::new();
        }
        self.output_enabled = false;
        self.pending.clear();
        vec![VoiceCommand::StatusChanged(self.status())]
    }

    /// Select the recognition model; restarts an open stream
    pub fn set_listen_voice(&mut self, voice: impl Into<String>) -> Vec<VoiceCommand> {
        let voice = voice.into();
        if voice.is_empty() {
            return Vec::new();
        }
        self.translate_input = foreign_lang(&voice, &self.settings.assistant_lang);
        self.settings.listen_voice = voice;

        if self.session.is_some() {
            self.start_listening()
        } else {
            Vec::new()
        }
    }

    /// Select the synthesis voice
    pub fn set_say_voice(&mut self, voice: impl Into<String>) {
        let voice = voice.into();
        if voice.is_empty() {
            return;
        }
        self.translate_output = foreign_lang(&voice, &self.settings.assistant_lang);
        self.settings.say_voice = voice;
    }

    /// Submit the transcript awaiting review
    pub fn accept_transcript(&mut self) -> Vec<VoiceCommand> {
        let Some(transcript) = self.review.take() else {
            return Vec::new();
        };
        let mut commands = self.submit_transcript(transcript);
        self.live.reset(self.session.is_some());
        self.live.sent_visible = true;
        commands.push(VoiceCommand::LiveRegionChanged(self.live.clone()));
        commands
    }

    /// Discard the transcript awaiting review
    pub fn reject_transcript(&mut self) -> Vec<VoiceCommand> {
        if self.review.take().is_none() {
            return Vec::new();
        }
        self.live.reset(self.session.is_some());
        vec![VoiceCommand::LiveRegionChanged(self.live.clone())]
    }

    fn submit_transcript(&mut self, transcript: String) -> Vec<VoiceCommand> {
        match self.translate_input.clone() {
            Some(source) => {
                let job = TranslationJob {
                    id: Uuid::new_v4(),
                    source,
                    target: self.settings.assistant_lang.clone(),
                    text: transcript,
                    purpose: TranslationPurpose::Submit,
                };
                self.jobs.insert(job.id, job.purpose);
                vec![VoiceCommand::Translate(job)]
            }
            None => vec![VoiceCommand::Submit(transcript)],
        }
    }

    /// Feed back the result of an executed command
    pub fn handle_event(&mut self, event: VoiceEvent) -> Vec<VoiceCommand> {
        match event {
            VoiceEvent::Recognition { session, event } => {
                if self.session != Some(session) {
                    debug!("Dropping event from closed recognizer session {}", session);
                    return Vec::new();
                }
                match event {
                    RecognizeEvent::Data(data) => self.on_recognize_data(data),
                    RecognizeEvent::Error(error) => {
                        warn!("Recognition error: {}", error);
                        self.review = None;
                        self.live.reset(true);
                        vec![VoiceCommand::LiveRegionChanged(self.live.clone())]
                    }
                }
            }
            VoiceEvent::RecognizerFailed { session, error } => {
                if self.session != Some(session) {
                    return Vec::new();
                }
                warn!("Could not open recognizer: {}", error);
                self.session = None;
                self.review = None;
                self.live.reset(false);
                vec![
                    VoiceCommand::LiveRegionChanged(self.live.clone()),
                    VoiceCommand::StatusChanged(self.status()),
                ]
            }
            VoiceEvent::SpeechEnded { utterance, result } => {
                if let Err(error) = result {
                    warn!("Audio error: {}", error);
                }
                self.finish_speaking(utterance)
            }
            VoiceEvent::Translated { job, result } => {
                let Some(purpose) = self.jobs.remove(&job) else {
                    debug!("Dropping result of unknown translation job {}", job);
                    return Vec::new();
                };
                match (purpose, result) {
                    (TranslationPurpose::Speak { utterance }, Ok(text)) => {
                        if self.speaking != Some(utterance) {
                            return Vec::new();
                        }
                        debug!("Translated utterance: {}", text);
                        match self.synthesize(utterance, text) {
                            Some(command) => vec![command],
                            None => self.finish_speaking(utterance),
                        }
                    }
                    (TranslationPurpose::Speak { utterance }, Err(error)) => {
                        warn!("Utterance translation failed: {}", error);
                        self.finish_speaking(utterance)
                    }
                    (TranslationPurpose::Submit, Ok(text)) => vec![VoiceCommand::Submit(text)],
                    (TranslationPurpose::Submit, Err(error)) => {
                        warn!("Transcript translation failed, not sending: {}", error);
                        Vec::new()
                    }
                }
            }
        }
    }

    fn on_recognize_data(&mut self, data: RecognizeData) -> Vec<VoiceCommand> {
        let mut commands = Vec::new();
        let listening = self.session.is_some();

        for result in &data.results {
            let Some(best) = result.best() else {
                continue;
            };

            if result.is_final {
                self.live.sentence = Sentence::Final(confidence_html(&best.word_confidence));

                if best.confidence > self.settings.auto_submit_confidence {
                    debug!("Auto-submitting transcript ({:.2})", best.confidence);
                    commands.extend(self.submit_transcript(best.transcript.clone()));
                    self.review = None;
                    self.live.reset(listening);
                    self.live.sent_visible = true;
                } else {
                    debug!("Transcript needs review ({:.2})", best.confidence);
                    self.review = Some(best.transcript.clone());
                    self.live.review_visible = true;
                }
            } else {
                self.review = None;
                self.live.reset(listening);
                self.live.sentence = Sentence::Interim(best.transcript.clone());
            }
        }

        commands.push(VoiceCommand::LiveRegionChanged(self.live.clone()));
        commands
    }
}

/// Language of `voice` when it differs from `assistant_lang`
fn foreign_lang(voice: &str, assistant_lang: &str) -> Option<String> {
    let lang: String = voice.chars().take(2).collect();
    (!lang.is_empty() && lang != assistant_lang).then_some(lang)
}
