use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    /// CSS class the transcript uses for this author's bubbles
    pub fn css_class(&self) -> &'static str {
        match self {
            Author::User => "from-user",
            Author::Assistant => "from-watson",
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Assistant => write!(f, "assistant"),
        }
    }
}

/// A text field the service sends either as one string or as a list of parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Single(String),
    Many(Vec<String>),
}

impl TextValue {
    /// The individual text parts, in order
    pub fn parts(&self) -> Vec<&str> {
        match self {
            TextValue::Single(text) => vec![text.as_str()],
            TextValue::Many(parts) => parts.iter().map(String::as_str).collect(),
        }
    }

    /// Whether the field counts as carrying text.
    ///
    /// An empty string does not; a list always does, even when empty.
    pub fn is_present(&self) -> bool {
        match self {
            TextValue::Single(text) => !text.is_empty(),
            TextValue::Many(_) => true,
        }
    }
}

impl From<&str> for TextValue {
    fn from(text: &str) -> Self {
        TextValue::Single(text.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextValue>,

    /// Typed response items, in server emission order
    #[serde(default, deserialize_with = "lenient_items")]
    pub generic: Vec<GenericItem>,
}

/// A request or response payload exchanged with the assistant service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSection>,

    /// Opaque dialogue state echoed back on the next request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl MessagePayload {
    /// Build a request payload carrying user text and the previous context
    pub fn request(text: impl Into<String>, context: Option<serde_json::Value>) -> Self {
        Self {
            input: Some(InputSection {
                text: Some(TextValue::Single(text.into())),
            }),
            output: None,
            context,
        }
    }

    /// Parse a payload from its JSON form
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn input_text(&self) -> Option<&TextValue> {
        self.input.as_ref().and_then(|input| input.text.as_ref())
    }

    pub fn output_text(&self) -> Option<&TextValue> {
        self.output.as_ref().and_then(|output| output.text.as_ref())
    }
}

/// How an option list asks to be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionPreference {
    #[default]
    Text,
    Button,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionInput {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    #[serde(default)]
    pub input: Option<OptionInput>,
}

/// One selectable entry of an option response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub value: Option<OptionValue>,
}

impl OptionItem {
    /// The text re-submitted when this option is selected
    pub fn send_text(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|value| value.input.as_ref())
            .and_then(|input| input.text.as_deref())
    }
}

/// One entry of `output.generic`, keyed by `response_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "lowercase")]
pub enum GenericItem {
    Text {
        text: String,
    },
    Image {
        source: String,
        #[serde(default)]
        title: Option<String>,
    },
    Pause {
        time: u64,
        #[serde(default)]
        typing: bool,
    },
    Option {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        preference: Option<OptionPreference>,
        #[serde(default)]
        options: Vec<OptionItem>,
    },
    #[serde(other)]
    Unknown,
}

/// Decode generic items one by one so a single malformed item does not
/// discard the whole payload.
fn lenient_items<'de, D>(deserializer: D) -> std::result::Result<Vec<GenericItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<GenericItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!("Skipping malformed generic item: {}", e);
                None
            }
        })
        .collect())
}

/// Kind of a renderable fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentKind {
    Text,
    Image,
    Pause,
    Option,
}

/// Text to vocalize for a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpokenText {
    One(String),
    Many(Vec<String>),
}

impl SpokenText {
    /// The utterances in speaking order
    pub fn lines(&self) -> Vec<&str> {
        match self {
            SpokenText::One(line) => vec![line.as_str()],
            SpokenText::Many(lines) => lines.iter().map(String::as_str).collect(),
        }
    }
}

/// Timing directive carried by a pause fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseDirective {
    /// How long to hold before the next fragment
    pub millis: u64,
    /// Whether to show the typing indicator while holding
    pub typing: bool,
}

impl PauseDirective {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

/// Payload dispatched when the user selects an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub label: String,
    pub text: String,
}

/// One renderable/speakable unit derived from a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Pre-rendered markup body; empty for pauses
    pub html: String,
    pub spoken: Option<SpokenText>,
    pub pause: Option<PauseDirective>,
    pub options: Vec<OptionChoice>,
}

impl Fragment {
    pub fn text(html: impl Into<String>, spoken: Option<String>) -> Self {
        Self {
            kind: FragmentKind::Text,
            html: html.into(),
            spoken: spoken.map(SpokenText::One),
            pause: None,
            options: Vec::new(),
        }
    }

    pub fn image(html: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Image,
            html: html.into(),
            spoken: None,
            pause: None,
            options: Vec::new(),
        }
    }

    pub fn pause(millis: u64, typing: bool) -> Self {
        Self {
            kind: FragmentKind::Pause,
            html: String::new(),
            spoken: None,
            pause: Some(PauseDirective { millis, typing }),
            options: Vec::new(),
        }
    }

    pub fn option(html: impl Into<String>, spoken: Vec<String>, options: Vec<OptionChoice>) -> Self {
        Self {
            kind: FragmentKind::Option,
            html: html.into(),
            spoken: Some(SpokenText::Many(spoken)),
            pause: None,
            options,
        }
    }

    /// Whether the fragment produces a transcript element
    pub fn is_visible(&self) -> bool {
        self.kind != FragmentKind::Pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_value_shapes() {
        let single: TextValue = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(single.parts(), vec!["hi"]);

        let many: TextValue = serde_json::from_str("[\"a\", \"b\"]").unwrap();
        assert_eq!(many.parts(), vec!["a", "b"]);

        assert!(!TextValue::from("").is_present());
        assert!(TextValue::Many(vec![]).is_present());
    }

    #[test]
    fn test_unknown_response_type_parses() {
        let payload = MessagePayload::from_json(
            r#"{"output":{"text":"x","generic":[{"response_type":"connect_to_agent"},{"response_type":"text","text":"ok"}]}}"#,
        )
        .unwrap();
        let generic = &payload.output.unwrap().generic;
        assert_eq!(generic.len(), 2);
        assert_eq!(generic[0], GenericItem::Unknown);
    }

    #[test]
    fn test_malformed_item_is_skipped() {
        let payload = MessagePayload::from_json(
            r#"{"output":{"text":"x","generic":[{"response_type":"pause"},{"response_type":"text","text":"ok"}]}}"#,
        )
        .unwrap();
        let generic = payload.output.unwrap().generic;
        assert_eq!(generic, vec![GenericItem::Text { text: "ok".into() }]);
    }

    #[test]
    fn test_request_serializes_context() {
        let ctx = serde_json::json!({"conversation_id": "abc"});
        let payload = MessagePayload::request("hello", Some(ctx.clone()));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["input"]["text"], "hello");
        assert_eq!(value["context"], ctx);
        assert!(value.get("output").is_none());
    }

    #[test]
    fn test_option_send_text() {
        let item: OptionItem =
            serde_json::from_str(r#"{"label":"Yes","value":{"input":{"text":"yes please"}}}"#)
                .unwrap();
        assert_eq!(item.send_text(), Some("yes please"));

        let bare: OptionItem = serde_json::from_str(r#"{"label":"No"}"#).unwrap();
        assert_eq!(bare.send_text(), None);
    }

    #[test]
    fn test_pause_fragment_is_invisible() {
        let fragment = Fragment::pause(500, true);
        assert!(!fragment.is_visible());
        assert!(fragment.html.is_empty());
        assert!(fragment.spoken.is_none());
        assert_eq!(fragment.pause.unwrap().duration(), Duration::from_millis(500));
    }
}
