use crate::messages::Author;
use crate::playback::render::{Segment, TranscriptRenderer};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// A segment as it currently stands in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub segment: Segment,
    pub latest: bool,
    /// Entrance animation has been started
    pub loaded: bool,
}

impl TranscriptEntry {
    pub fn to_html(&self) -> String {
        self.segment.to_html(self.latest)
    }
}

#[derive(Debug, Default)]
struct TranscriptState {
    entries: Vec<TranscriptEntry>,
    typing: Option<String>,
    scrolls: usize,
}

/// In-memory transcript container.
///
/// Cloning shares the underlying transcript, so a host can keep a handle
/// while the panel owns the renderer.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    state: Arc<RwLock<TranscriptState>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.state.read().entries.clone()
    }

    /// Entries of one author, oldest first
    pub fn by_author(&self, author: Author) -> Vec<TranscriptEntry> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| e.segment.author == author)
            .cloned()
            .collect()
    }

    /// Current typing indicator text
    pub fn typing(&self) -> Option<String> {
        self.state.read().typing.clone()
    }

    /// Number of scroll-to-bottom requests received
    pub fn scroll_count(&self) -> usize {
        self.state.read().scrolls
    }

    /// Markup of the whole transcript container
    pub fn to_html(&self) -> String {
        self.state
            .read()
            .entries
            .iter()
            .map(TranscriptEntry::to_html)
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.typing = None;
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

impl TranscriptRenderer for TranscriptLog {
    fn append(&mut self, segment: &Segment) {
        self.state.write().entries.push(TranscriptEntry {
            segment: segment.clone(),
            latest: true,
            loaded: false,
        });
    }

    fn animate_in(&mut self, id: Uuid) {
        if let Some(entry) = self
            .state
            .write()
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.segment.id == id)
        {
            entry.loaded = true;
        }
    }

    fn demote_latest(&mut self, author: Author) {
        for entry in self
            .state
            .write()
            .entries
            .iter_mut()
            .filter(|e| e.segment.author == author)
        {
            entry.latest = false;
        }
    }

    fn set_typing(&mut self, label: Option<&str>) {
        self.state.write().typing = label.map(str::to_string);
    }

    fn scroll_to_bottom(&mut self) {
        self.state.write().scrolls += 1;
    }
}
