use anyhow::{Context, Result};
use async_trait::async_trait;
use murmur::api::AssistantTransport;
use murmur::integration::{PanelBuilder, PanelCommand, PanelConfig, PanelEvent, PanelHandle};
use murmur::messages::{Author, MessagePayload, TranscriptLog};
use murmur::MurmurError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replays recorded assistant responses, one per request
struct ScriptedTransport {
    responses: Mutex<VecDeque<MessagePayload>>,
}

impl ScriptedTransport {
    fn from_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path))?;
        let responses: Vec<MessagePayload> =
            serde_json::from_str(&json).context("Script must be a JSON array of payloads")?;
        info!("Loaded {} scripted responses", responses.len());
        Ok(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl AssistantTransport for ScriptedTransport {
    async fn message(
        &self,
        _workspace_id: Option<&str>,
        _request: &MessagePayload,
    ) -> murmur::Result<MessagePayload> {
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| MurmurError::AssistantError("script exhausted".to_string()))
    }
}

/// Print entries appended since the last call
fn print_new(log: &TranscriptLog, printed: &mut usize) {
    let entries = log.entries();
    for entry in entries.iter().skip(*printed) {
        let who = match entry.segment.author {
            Author::User => "you",
            Author::Assistant => "assistant",
        };
        println!("[{}] {}", who, entry.segment.html);
    }
    *printed = entries.len();
}

/// Tracks whether the panel still has responses to play
#[derive(Debug)]
struct Progress {
    /// Submitted lines the panel has not confirmed as sent
    unsent: usize,
    idle: bool,
}

impl Progress {
    fn settled(&self) -> bool {
        self.unsent == 0 && self.idle
    }
}

fn drain_events(handle: &PanelHandle, progress: &mut Progress) {
    while let Some(event) = handle.try_recv_event() {
        match event {
            PanelEvent::Error(message) => eprintln!("! {}", message),
            PanelEvent::MessageSent(_) => {
                progress.unsent = progress.unsent.saturating_sub(1);
                progress.idle = false;
            }
            PanelEvent::Idle => progress.idle = true,
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let script = args
        .next()
        .context("Usage: murmur <script.json> [config.json]")?;
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path))?;
            PanelConfig::from_json(&json)?
        }
        None => PanelConfig::default(),
    };

    info!("Starting murmur console panel");

    let log = TranscriptLog::new();
    let (panel, handle) = PanelBuilder::new()
        .with_config(config)
        .with_transport(Arc::new(ScriptedTransport::from_file(&script)?))
        .with_renderer(log.clone())
        .build()?;
    let task = panel.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut printed = 0;
    // The greeting request is in flight from the start
    let mut progress = Progress {
        unsent: 0,
        idle: false,
    };

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !line.trim().is_empty() {
                        progress.unsent += 1;
                    }
                    handle.send_command(PanelCommand::SubmitInput(line))?;
                }
                None => break,
            },
            _ = ticker.tick() => {
                print_new(&log, &mut printed);
                drain_events(&handle, &mut progress);
            }
        }
    }

    // Let in-flight responses and pauses play out before leaving
    while !progress.settled() {
        ticker.tick().await;
        drain_events(&handle, &mut progress);
    }
    print_new(&log, &mut printed);

    handle.send_command(PanelCommand::Shutdown)?;
    if let Err(e) = task.await? {
        warn!("Panel stopped with error: {}", e);
    }
    drain_events(&handle, &mut progress);

    Ok(())
}
