//! Sequential response playback
//!
//! Assistant fragments go through a FIFO queue drained one fragment at a
//! time, so a batch that arrives while an earlier one is still pausing waits
//! its turn. User fragments bypass the queue and render immediately.
//!
//! The scheduler does not own a clock. When the drain loop reaches a pause it
//! stops and reports the duration; the caller arranges a timer and calls
//! [`PlaybackScheduler::resume`] when it fires.

use crate::messages::{Author, Fragment};
use crate::playback::render::{Position, Segment, TranscriptRenderer};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Default label of the typing indicator shown during pauses
pub const DEFAULT_TYPING_LABEL: &str = "Watson Assistant Typing...";

/// Result of a drain step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drained {
    /// Number of fragments rendered in this step
    pub rendered: usize,

    /// Utterances to voice, in rendering order
    pub spoken: Vec<String>,

    /// Set when the step stopped at a new pause; the caller must call
    /// `resume` after this duration
    pub pause: Option<Duration>,
}

#[derive(Debug, Clone)]
struct Queued {
    fragment: Fragment,
    /// First fragment of its batch
    opens_batch: bool,
}

/// Two-lane playback scheduler
#[derive(Debug)]
pub struct PlaybackScheduler {
    /// Not-yet-rendered assistant fragments, oldest first
    pending: VecDeque<Queued>,

    /// A pause is holding the assistant lane
    paused: bool,

    /// The next visible assistant fragment opens a batch
    top_next: bool,

    typing_label: String,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_LABEL)
    }
}

impl PlaybackScheduler {
    pub fn new(typing_label: impl Into<String>) -> Self {
        Self {
            pending: VecDeque::new(),
            paused: false,
            top_next: false,
            typing_label: typing_label.into(),
        }
    }

    /// Render a user batch right away, independent of the assistant lane
    pub fn play_user(
        &mut self,
        fragments: &[Fragment],
        renderer: &mut dyn TranscriptRenderer,
    ) -> Drained {
        let mut drained = Drained::default();
        let mut position = Position::Top;

        for fragment in fragments {
            if !fragment.is_visible() {
                debug!("Ignoring pause on the user lane");
                continue;
            }
            if position == Position::Top {
                renderer.demote_latest(Author::User);
            }
            drained.spoken.extend(render(renderer, Author::User, position, fragment));
            drained.rendered += 1;
            position = Position::Sub;
        }

        drained
    }

    /// Append an assistant batch and drain unless a pause holds the lane
    pub fn enqueue_assistant(
        &mut self,
        fragments: Vec<Fragment>,
        renderer: &mut dyn TranscriptRenderer,
    ) -> Drained {
        if fragments.is_empty() {
            return Drained::default();
        }

        debug!(
            "Queueing assistant batch of {} fragments ({} already pending)",
            fragments.len(),
            self.pending.len()
        );

        self.pending.extend(fragments.into_iter().enumerate().map(|(i, fragment)| Queued {
            fragment,
            opens_batch: i == 0,
        }));

        self.drain(renderer)
    }

    /// Process queued fragments until the queue empties or a pause starts
    pub fn drain(&mut self, renderer: &mut dyn TranscriptRenderer) -> Drained {
        let mut drained = Drained::default();

        if self.paused {
            return drained;
        }

        while let Some(queued) = self.pending.pop_front() {
            if queued.opens_batch {
                self.top_next = true;
            }

            let fragment = queued.fragment;
            if let Some(pause) = fragment.pause.filter(|_| !fragment.is_visible()) {
                if pause.typing {
                    renderer.set_typing(Some(&self.typing_label));
                }
                debug!("Pausing assistant lane for {}ms", pause.millis);
                self.paused = true;
                drained.pause = Some(pause.duration());
                return drained;
            }

            let position = if self.top_next {
                // Batch-level "latest": the whole new batch replaces the old one
                renderer.demote_latest(Author::Assistant);
                Position::Top
            } else {
                Position::Sub
            };
            self.top_next = false;

            drained
                .spoken
                .extend(render(renderer, Author::Assistant, position, &fragment));
            drained.rendered += 1;
        }

        drained
    }

    /// Continue after a pause elapsed
    pub fn resume(&mut self, renderer: &mut dyn TranscriptRenderer) -> Drained {
        if !self.paused {
            warn!("Resume requested while no pause is active");
            return Drained::default();
        }

        renderer.set_typing(None);
        self.paused = false;
        self.drain(renderer)
    }

    /// Whether the assistant lane has work in flight or queued
    pub fn is_draining(&self) -> bool {
        self.paused || !self.pending.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Append, animate and reveal one fragment; returns its utterances
fn render(
    renderer: &mut dyn TranscriptRenderer,
    author: Author,
    position: Position,
    fragment: &Fragment,
) -> Vec<String> {
    let segment = Segment::new(author, position, fragment);
    renderer.append(&segment);
    renderer.animate_in(segment.id);
    renderer.scroll_to_bottom();

    fragment
        .spoken
        .as_ref()
        .map(|spoken| spoken.lines().into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::TranscriptLog;

    fn text(s: &str) -> Fragment {
        Fragment::text(s, Some(s.to_string()))
    }

    fn htmls(log: &TranscriptLog) -> Vec<String> {
        log.entries().into_iter().map(|e| e.segment.html).collect()
    }

    #[test]
    fn test_batch_renders_in_order() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        let drained = scheduler.enqueue_assistant(vec![text("a"), text("b"), text("c")], &mut log);

        assert_eq!(drained.rendered, 3);
        assert_eq!(drained.spoken, vec!["a", "b", "c"]);
        assert_eq!(drained.pause, None);
        assert_eq!(htmls(&log), vec!["a", "b", "c"]);
        assert!(!scheduler.is_draining());
    }

    #[test]
    fn test_top_and_sub_positions() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(vec![text("a"), text("b")], &mut log);
        scheduler.enqueue_assistant(vec![text("c")], &mut log);

        let positions: Vec<Position> = log.entries().iter().map(|e| e.segment.position).collect();
        assert_eq!(positions, vec![Position::Top, Position::Sub, Position::Top]);
    }

    #[test]
    fn test_pause_holds_following_fragments() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        let drained = scheduler.enqueue_assistant(
            vec![text("a"), Fragment::pause(1000, true), text("b")],
            &mut log,
        );
        assert_eq!(drained.rendered, 1);
        assert_eq!(drained.pause, Some(Duration::from_millis(1000)));
        assert!(scheduler.is_paused());
        assert_eq!(log.typing().as_deref(), Some(DEFAULT_TYPING_LABEL));

        let resumed = scheduler.resume(&mut log);
        assert_eq!(resumed.spoken, vec!["b"]);
        assert_eq!(log.typing(), None);
        assert_eq!(htmls(&log), vec!["a", "b"]);

        // "b" continues the batch opened by "a"
        assert_eq!(log.entries()[1].segment.position, Position::Sub);
    }

    #[test]
    fn test_pause_without_typing_leaves_indicator_clear() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(vec![Fragment::pause(10, false), text("x")], &mut log);
        assert_eq!(log.typing(), None);
        assert!(log.entries().is_empty());

        scheduler.resume(&mut log);
        // A leading pause defers "top" to the first visible fragment
        assert_eq!(log.entries()[0].segment.position, Position::Top);
    }

    #[test]
    fn test_second_batch_waits_for_first_pause() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(
            vec![text("a1"), Fragment::pause(500, false), text("a2")],
            &mut log,
        );
        let second = scheduler.enqueue_assistant(vec![text("b1")], &mut log);

        assert_eq!(second.rendered, 0);
        assert_eq!(second.pause, None);
        assert_eq!(scheduler.pending_len(), 2);

        scheduler.resume(&mut log);
        assert_eq!(htmls(&log), vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_drained_batch_lets_next_start_immediately() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(vec![text("a")], &mut log);
        let drained = scheduler.enqueue_assistant(vec![text("b")], &mut log);
        assert_eq!(drained.rendered, 1);
    }

    #[test]
    fn test_user_lane_ignores_assistant_pause() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(vec![Fragment::pause(5000, true), text("later")], &mut log);
        let drained = scheduler.play_user(&[Fragment::text("me", None)], &mut log);

        assert_eq!(drained.rendered, 1);
        assert!(drained.spoken.is_empty());
        assert_eq!(htmls(&log), vec!["me"]);
        assert!(scheduler.is_paused());
    }

    #[test]
    fn test_new_batch_demotes_previous_latest() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        scheduler.enqueue_assistant(vec![text("a"), text("b")], &mut log);
        scheduler.play_user(&[Fragment::text("me", None)], &mut log);
        scheduler.enqueue_assistant(vec![text("c")], &mut log);

        let latest: Vec<(String, bool)> = log
            .entries()
            .into_iter()
            .map(|e| (e.segment.html, e.latest))
            .collect();
        assert_eq!(
            latest,
            vec![
                ("a".to_string(), false),
                ("b".to_string(), false),
                ("me".to_string(), true),
                ("c".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_pause_is_never_spoken() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        let drained = scheduler.enqueue_assistant(vec![Fragment::pause(1, true)], &mut log);
        assert!(drained.spoken.is_empty());
        let resumed = scheduler.resume(&mut log);
        assert!(resumed.spoken.is_empty());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_resume_without_pause_is_noop() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();
        assert_eq!(scheduler.resume(&mut log), Drained::default());
    }

    #[test]
    fn test_long_batch_drains_iteratively() {
        let mut log = TranscriptLog::new();
        let mut scheduler = PlaybackScheduler::default();

        let batch: Vec<Fragment> = (0..10_000).map(|i| Fragment::text(i.to_string(), None)).collect();
        let drained = scheduler.enqueue_assistant(batch, &mut log);
        assert_eq!(drained.rendered, 10_000);
    }
}
