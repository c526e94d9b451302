//! Transcript playback
//!
//! This module provides:
//! - The two-lane playback scheduler
//! - The rendering contract for the transcript container

pub mod render;
pub mod scheduler;

pub use render::{Position, Segment, TranscriptRenderer};
pub use scheduler::{Drained, PlaybackScheduler, DEFAULT_TYPING_LABEL};
