//! Transcript rendering contract
//!
//! The scheduler never touches the display directly; it hands finished
//! [`Segment`]s to a [`TranscriptRenderer`].

use crate::messages::{Author, Fragment, OptionChoice};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a segment sits within its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// First visible fragment of a batch
    Top,
    /// Any later fragment of the same batch
    Sub,
}

impl Position {
    pub fn css_class(&self) -> &'static str {
        match self {
            Position::Top => "top",
            Position::Sub => "sub",
        }
    }
}

/// A transcript element ready to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: Uuid,
    pub author: Author,
    pub position: Position,
    /// Inner markup of the bubble
    pub html: String,
    /// Options the bubble dispatches when clicked, indexed by `data-option`
    pub options: Vec<OptionChoice>,
    pub timestamp: DateTime<Utc>,
}

impl Segment {
    pub fn new(author: Author, position: Position, fragment: &Fragment) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            position,
            html: fragment.html.clone(),
            options: fragment.options.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Class list of the bubble element
    pub fn classes(&self, latest: bool) -> Vec<&'static str> {
        let mut classes = vec![self.author.css_class()];
        if latest {
            classes.push("latest");
        }
        classes.push(self.position.css_class());
        classes
    }

    /// Full element markup:
    /// `segments > from-* [latest] top|sub > message-inner > p`
    pub fn to_html(&self, latest: bool) -> String {
        format!(
            "<div class=\"segments\"><div class=\"{}\"><div class=\"message-inner\"><p>{}</p></div></div></div>",
            self.classes(latest).join(" "),
            self.html
        )
    }

    /// Resolve a clicked `data-option` index to its choice
    pub fn option(&self, index: usize) -> Option<&OptionChoice> {
        self.options.get(index)
    }
}

/// Display surface for the transcript container
pub trait TranscriptRenderer {
    /// Append a segment; it is marked `latest` on arrival
    fn append(&mut self, segment: &Segment);

    /// Start the entrance animation of an appended segment
    fn animate_in(&mut self, id: Uuid);

    /// Drop the `latest` mark from every segment of `author`
    fn demote_latest(&mut self, author: Author);

    /// Show the typing indicator with `label`, or clear it with `None`
    fn set_typing(&mut self, label: Option<&str>);

    /// Scroll the transcript to its newest content
    fn scroll_to_bottom(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_markup() {
        let fragment = Fragment::text("Hello!", Some("Hello!".into()));
        let segment = Segment::new(Author::Assistant, Position::Top, &fragment);
        assert_eq!(
            segment.to_html(true),
            "<div class=\"segments\"><div class=\"from-watson latest top\"><div class=\"message-inner\"><p>Hello!</p></div></div></div>"
        );
    }

    #[test]
    fn test_demoted_user_sub_classes() {
        let fragment = Fragment::text("hi", None);
        let segment = Segment::new(Author::User, Position::Sub, &fragment);
        assert_eq!(segment.classes(false), vec!["from-user", "sub"]);
    }
}
