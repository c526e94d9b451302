//! Recognition results and the live transcript region
//!
//! Mirrors the JSON the speech-to-text service streams back, plus the
//! state of the "in progress" region that shows what the microphone heard.

use serde::{Deserialize, Serialize};

/// Confidence above which a final transcript is submitted without review
pub const AUTO_SUBMIT_CONFIDENCE: f64 = 0.95;

/// Lightest grey used for the least confident words (0 = black)
const MAX_SHADE: f64 = 200.0;

/// A `(word, score)` pair; score ranges from 0 (unsure) to 1 (certain)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordConfidence(pub String, pub f64);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,

    /// Only present on final results
    #[serde(default)]
    pub confidence: f64,

    /// Only present on final results
    #[serde(default)]
    pub word_confidence: Vec<WordConfidence>,
}

/// Roughly one sentence of recognized speech
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(rename = "final", default)]
    pub is_final: bool,

    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl RecognitionResult {
    /// The best alternative, if the service sent any
    pub fn best(&self) -> Option<&Alternative> {
        self.alternatives.first()
    }
}

/// One `data` event of the recognition stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizeData {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
}

impl RecognizeData {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Grey level for a word score: confident words are darker
pub fn shade(score: f64) -> u8 {
    let score = score.clamp(0.0, 1.0);
    (MAX_SHADE - (score * MAX_SHADE).round()) as u8
}

/// Word-by-word greyscale rendering of a final transcript
pub fn confidence_html(words: &[WordConfidence]) -> String {
    let spans: Vec<String> = words
        .iter()
        .map(|WordConfidence(word, score)| {
            let s = shade(*score);
            format!("<span style=\"color: rgb({s},{s},{s})\">{word}</span>")
        })
        .collect();
    format!("{} ", spans.join(" "))
}

/// Content of the current sentence slot
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Sentence {
    #[default]
    Empty,
    Interim(String),
    Final(String),
}

/// The live transcript region and its review affordances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveRegion {
    pub visible: bool,
    pub sentence: Sentence,
    /// Accept/reject buttons for a low-confidence transcript
    pub review_visible: bool,
    /// "Sent" indicator after a submission
    pub sent_visible: bool,
}

impl LiveRegion {
    /// Start a new empty sentence; the region shows only while listening
    pub fn reset(&mut self, listening: bool) {
        self.sentence = Sentence::Empty;
        self.review_visible = false;
        self.sent_visible = false;
        self.visible = listening;
    }
}
