//! Panel runtime for the conversation widget
//!
//! Connects all components: API client -> formatter -> scheduler -> renderer,
//! with spoken output routed through the voice controller and microphone
//! transcripts routed back to the API client.
//!
//! The loop is the only place that mutates the scheduler, the controller and
//! the renderer. Anything that suspends (pause timers, network calls,
//! recognizer streams, playback) runs as a spawned task that posts its result
//! back through the loopback channel.

use crate::api::{AssistantClient, AssistantTransport};
use crate::integration::config::PanelConfig;
use crate::messages::{Author, MessageFormatter, MessagePayload, OptionChoice, TranscriptLog};
use crate::playback::{Drained, PlaybackScheduler, TranscriptRenderer};
use crate::speech::{
    LiveRegion, SpeechToText, TextToSpeech, TokenProvider, TokenService, Tokens, Translator,
    Unavailable, VoiceCommand, VoiceEvent, VoiceStatus, VoiceTurnController,
};
use crate::utils::{HostChannels, LoopbackChannels};
use crate::{MurmurError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Commands that the hosting UI sends to the panel
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    /// Send text to the assistant as a user message
    SendMessage(String),

    /// Enter key in the input box; blank input is ignored
    SubmitInput(String),

    /// A rendered option was clicked
    SelectOption(OptionChoice),

    /// Microphone controls
    StartListening,
    StopListening,
    ToggleListening,

    /// Speaker controls
    EnableSpeech,
    MuteSpeech,

    /// Voice selection
    SetListenVoice(String),
    SetSayVoice(String),

    /// Review buttons for a low-confidence transcript
    AcceptTranscript,
    RejectTranscript,

    /// Stop the panel loop
    Shutdown,
}

/// Events emitted by the panel
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    /// Token fetch finished; reports which voice features are usable
    Ready {
        listen_available: bool,
        speak_available: bool,
    },

    /// A user message went out to the assistant
    MessageSent(String),

    /// Fragments were added to the transcript
    Rendered { author: Author, count: usize },

    /// The live transcript region changed
    LiveRegionChanged(LiveRegion),

    /// Mic/speaker state changed
    VoiceStatusChanged(VoiceStatus),

    /// An action was abandoned
    Error(String),

    /// No request is awaiting a response and the assistant lane is empty
    Idle,

    /// The panel has shut down
    Shutdown,
}

/// Results posted back into the loop by spawned tasks
#[derive(Debug)]
enum Loopback {
    Payload {
        author: Author,
        payload: MessagePayload,
    },
    PauseElapsed,
    TokensFetched(Tokens),
    Voice(VoiceEvent),
    SendFailed(String),
}

/// Handle for controlling the panel from the UI
#[derive(Debug, Clone)]
pub struct PanelHandle {
    command_tx: UnboundedSender<PanelCommand>,
    event_rx: Receiver<PanelEvent>,
}

impl PanelHandle {
    /// Send a command to the panel
    pub fn send_command(&self, cmd: PanelCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| MurmurError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Try to receive an event from the panel
    pub fn try_recv_event(&self) -> Option<PanelEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get the event receiver for blocking or select-based consumers
    pub fn event_receiver(&self) -> Receiver<PanelEvent> {
        self.event_rx.clone()
    }
}

/// External services the panel talks to
struct Services {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    translator: Arc<dyn Translator>,
    token_provider: Arc<dyn TokenProvider>,
}

/// State owned by the loop task
struct PanelCore {
    config: PanelConfig,
    client: Arc<AssistantClient>,
    services: Services,
    formatter: MessageFormatter,
    scheduler: PlaybackScheduler,
    voice: VoiceTurnController,
    renderer: Box<dyn TranscriptRenderer + Send>,

    event_tx: Sender<PanelEvent>,
    loopback_tx: UnboundedSender<Loopback>,

    /// Stop signals of running recognizer tasks, by session
    recognizers: HashMap<u64, oneshot::Sender<()>>,

    /// Requests sent to the assistant that have not answered yet
    in_flight: usize,
}

/// Conversation panel; consumed by [`Panel::run`]
pub struct Panel {
    core: PanelCore,
    command_rx: UnboundedReceiver<PanelCommand>,
    loopback_rx: UnboundedReceiver<Loopback>,
}

impl Panel {
    /// The API client the panel sends through
    pub fn client(&self) -> Arc<AssistantClient> {
        Arc::clone(&self.core.client)
    }

    /// Run the panel on the current task until shutdown
    pub async fn run(self) -> Result<()> {
        let Panel {
            mut core,
            mut command_rx,
            mut loopback_rx,
        } = self;

        core.init();
        info!("Panel started");

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(PanelCommand::Shutdown) => {
                        info!("Panel shutdown requested");
                        break;
                    }
                    Some(command) => core.handle_command(command),
                    None => {
                        warn!("Command channel disconnected");
                        break;
                    }
                },
                Some(message) = loopback_rx.recv() => core.handle_loopback(message),
            }
        }

        core.shutdown();
        info!("Panel stopped");
        Ok(())
    }

    /// Run the panel as a tokio task
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

impl PanelCore {
    fn init(&mut self) {
        if let Some(workspace) = &self.config.workspace_id {
            self.client.set_workspace(workspace.clone());
        }

        let tx = self.loopback_tx.clone();
        self.client.on_request_payload(move |payload| {
            let _ = tx.send(Loopback::Payload {
                author: Author::User,
                payload: payload.clone(),
            });
        });
        let tx = self.loopback_tx.clone();
        self.client.on_response_payload(move |payload| {
            let _ = tx.send(Loopback::Payload {
                author: Author::Assistant,
                payload: payload.clone(),
            });
        });

        // Empty first turn fetches the greeting
        self.in_flight += 1;
        let client = Arc::clone(&self.client);
        let tx = self.loopback_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_request("", None).await {
                let _ = tx.send(Loopback::SendFailed(e.user_message()));
            }
        });

        let provider = Arc::clone(&self.services.token_provider);
        let tx = self.loopback_tx.clone();
        tokio::spawn(async move {
            let (stt, tts) = tokio::join!(
                provider.fetch(TokenService::SpeechToText),
                provider.fetch(TokenService::TextToSpeech)
            );
            let stt = stt
                .inspect_err(|e| warn!("Speech-to-text disabled: {}", e))
                .ok();
            let tts = tts
                .inspect_err(|e| warn!("Text-to-speech disabled: {}", e))
                .ok();
            let _ = tx.send(Loopback::TokensFetched(Tokens::new(stt, tts)));
        });
    }

    fn handle_command(&mut self, command: PanelCommand) {
        debug!("Panel command: {:?}", command);
        let commands = match command {
            PanelCommand::SendMessage(text) => {
                self.send(text);
                Vec::new()
            }
            PanelCommand::SubmitInput(text) => {
                if text.trim().is_empty() {
                    debug!("Ignoring blank input");
                } else {
                    self.send(text);
                }
                Vec::new()
            }
            PanelCommand::SelectOption(choice) => {
                debug!("Option selected: {}", choice.label);
                self.send(choice.text);
                Vec::new()
            }
            PanelCommand::StartListening => self.voice.start_listening(),
            PanelCommand::StopListening => self.voice.stop_listening(),
            PanelCommand::ToggleListening => self.voice.toggle_listening(),
            PanelCommand::EnableSpeech => self.voice.enable_speech_output(),
            PanelCommand::MuteSpeech => self.voice.mute_speech_output(),
            PanelCommand::SetListenVoice(voice) => self.voice.set_listen_voice(voice),
            PanelCommand::SetSayVoice(voice) => {
                self.voice.set_say_voice(voice);
                Vec::new()
            }
            PanelCommand::AcceptTranscript => self.voice.accept_transcript(),
            PanelCommand::RejectTranscript => self.voice.reject_transcript(),
            PanelCommand::Shutdown => Vec::new(),
        };
        self.execute(commands);
    }

    fn handle_loopback(&mut self, message: Loopback) {
        match message {
            Loopback::Payload { author, payload } => {
                if author == Author::Assistant {
                    self.in_flight = self.in_flight.saturating_sub(1);
                }
                let fragments = self.formatter.format(&payload, author);
                let drained = match author {
                    Author::User => self.scheduler.play_user(&fragments, self.renderer.as_mut()),
                    Author::Assistant => self
                        .scheduler
                        .enqueue_assistant(fragments, self.renderer.as_mut()),
                };
                self.after_drain(author, drained);
            }
            Loopback::PauseElapsed => {
                let drained = self.scheduler.resume(self.renderer.as_mut());
                self.after_drain(Author::Assistant, drained);
            }
            Loopback::TokensFetched(tokens) => {
                info!(
                    "Tokens fetched (stt: {}, tts: {})",
                    tokens.stt.is_some(),
                    tokens.tts.is_some()
                );
                self.emit(PanelEvent::Ready {
                    listen_available: tokens.stt.is_some(),
                    speak_available: tokens.tts.is_some(),
                });
                self.voice.set_tokens(tokens);
                self.emit(PanelEvent::VoiceStatusChanged(self.voice.status()));
            }
            Loopback::Voice(event) => {
                if let VoiceEvent::RecognizerFailed { session, .. } = &event {
                    self.recognizers.remove(session);
                }
                let commands = self.voice.handle_event(event);
                self.execute(commands);
            }
            Loopback::SendFailed(message) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.emit(PanelEvent::Error(message));
                self.report_idle();
            }
        }
    }

    fn after_drain(&mut self, author: Author, drained: Drained) {
        if drained.rendered > 0 {
            self.emit(PanelEvent::Rendered {
                author,
                count: drained.rendered,
            });
        }

        for line in drained.spoken {
            let commands = self.voice.say(line);
            self.execute(commands);
        }

        if let Some(pause) = drained.pause {
            let tx = self.loopback_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(pause).await;
                let _ = tx.send(Loopback::PauseElapsed);
            });
        }

        if author == Author::Assistant {
            self.report_idle();
        }
    }

    fn report_idle(&self) {
        if self.in_flight == 0 && !self.scheduler.is_draining() {
            debug!("Panel idle");
            self.emit(PanelEvent::Idle);
        }
    }

    /// Carry out the side effects requested by the voice controller
    fn execute(&mut self, commands: Vec<VoiceCommand>) {
        for command in commands {
            match command {
                VoiceCommand::OpenRecognizer {
                    session,
                    token,
                    model,
                } => self.open_recognizer(session, token, model),
                VoiceCommand::CloseRecognizer { session } => {
                    if let Some(stop) = self.recognizers.remove(&session) {
                        let _ = stop.send(());
                    }
                }
                VoiceCommand::Synthesize { utterance, request } => {
                    let tts = Arc::clone(&self.services.tts);
                    let tx = self.loopback_tx.clone();
                    tokio::spawn(async move {
                        let result = match tts.synthesize(request).await {
                            Ok(mut handle) => {
                                let finished = handle.finished().await;
                                handle.dispose();
                                finished
                            }
                            Err(e) => Err(e),
                        };
                        let _ = tx.send(Loopback::Voice(VoiceEvent::SpeechEnded {
                            utterance,
                            result: result.map_err(|e| e.to_string()),
                        }));
                    });
                }
                VoiceCommand::Translate(job) => {
                    let translator = Arc::clone(&self.services.translator);
                    let tx = self.loopback_tx.clone();
                    tokio::spawn(async move {
                        let result = translator
                            .translate(&job.source, &job.target, &job.text)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = tx.send(Loopback::Voice(VoiceEvent::Translated {
                            job: job.id,
                            result,
                        }));
                    });
                }
                VoiceCommand::Submit(text) => self.send(text),
                VoiceCommand::LiveRegionChanged(live) => {
                    self.emit(PanelEvent::LiveRegionChanged(live))
                }
                VoiceCommand::StatusChanged(status) => {
                    self.emit(PanelEvent::VoiceStatusChanged(status))
                }
            }
        }
    }

    fn open_recognizer(&mut self, session: u64, token: String, model: String) {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.recognizers.insert(session, stop_tx);

        let stt = Arc::clone(&self.services.stt);
        let tx = self.loopback_tx.clone();
        tokio::spawn(async move {
            let mut stream = match stt.open_stream(&token, &model).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Loopback::Voice(VoiceEvent::RecognizerFailed {
                        session,
                        error: e.to_string(),
                    }));
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = stream.next_event() => match event {
                        Some(event) => {
                            let event = VoiceEvent::Recognition { session, event };
                            if tx.send(Loopback::Voice(event)).is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = tx.send(Loopback::Voice(VoiceEvent::RecognizerFailed {
                                session,
                                error: "recognition stream closed".to_string(),
                            }));
                            break;
                        }
                    },
                }
            }

            debug!("Stopping recognizer session {}", session);
            stream.stop();
        });
    }

    fn send(&mut self, text: String) {
        self.emit(PanelEvent::MessageSent(text.clone()));
        self.in_flight += 1;

        let client = Arc::clone(&self.client);
        let tx = self.loopback_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_message(&text).await {
                let _ = tx.send(Loopback::SendFailed(e.user_message()));
            }
        });
    }

    fn emit(&self, event: PanelEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            error!("Dropping panel event: {}", e);
        }
    }

    fn shutdown(&mut self) {
        for (_, stop) in self.recognizers.drain() {
            let _ = stop.send(());
        }
        self.emit(PanelEvent::Shutdown);
    }
}

/// Builder for creating a panel
pub struct PanelBuilder {
    config: PanelConfig,
    transport: Option<Arc<dyn AssistantTransport>>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    translator: Arc<dyn Translator>,
    token_provider: Arc<dyn TokenProvider>,
    renderer: Option<Box<dyn TranscriptRenderer + Send>>,
}

impl PanelBuilder {
    /// Create a new builder with default configuration and no speech services
    pub fn new() -> Self {
        Self {
            config: PanelConfig::default(),
            transport: None,
            stt: Arc::new(Unavailable),
            tts: Arc::new(Unavailable),
            translator: Arc::new(Unavailable),
            token_provider: Arc::new(Unavailable),
            renderer: None,
        }
    }

    /// Set the complete configuration
    pub fn with_config(mut self, config: PanelConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the assistant transport (required)
    pub fn with_transport(mut self, transport: Arc<dyn AssistantTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_speech_to_text(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = stt;
        self
    }

    pub fn with_text_to_speech(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = tts;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = provider;
        self
    }

    /// Render into `renderer` instead of a fresh [`TranscriptLog`]
    pub fn with_renderer(mut self, renderer: impl TranscriptRenderer + Send + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Build the panel
    pub fn build(self) -> Result<(Panel, PanelHandle)> {
        self.config.validate().map_err(MurmurError::ConfigError)?;
        let transport = self
            .transport
            .ok_or_else(|| MurmurError::ConfigError("An assistant transport is required".into()))?;

        let channels: HostChannels<PanelCommand, PanelEvent> =
            HostChannels::new(self.config.channel_buffer_size);
        let loopback = LoopbackChannels::new();

        let handle = PanelHandle {
            command_tx: channels.command_tx,
            event_rx: channels.event_rx,
        };

        let core = PanelCore {
            formatter: MessageFormatter::new(self.config.image_width),
            scheduler: PlaybackScheduler::new(self.config.typing_label.clone()),
            voice: VoiceTurnController::new(self.config.voice_settings(), Tokens::default()),
            client: Arc::new(AssistantClient::new(transport)),
            services: Services {
                stt: self.stt,
                tts: self.tts,
                translator: self.translator,
                token_provider: self.token_provider,
            },
            renderer: self
                .renderer
                .unwrap_or_else(|| Box::new(TranscriptLog::new())),
            event_tx: channels.event_tx,
            loopback_tx: loopback.tx,
            recognizers: HashMap::new(),
            in_flight: 0,
            config: self.config,
        };

        let panel = Panel {
            core,
            command_rx: channels.command_rx,
            loopback_rx: loopback.rx,
        };

        Ok((panel, handle))
    }
}

impl Default for PanelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
