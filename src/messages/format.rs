//! Payload → fragment expansion
//!
//! Turns one request or response payload into the ordered list of fragments
//! the playback scheduler renders.

use super::types::{
    Author, Fragment, GenericItem, MessagePayload, OptionChoice, OptionItem, OptionPreference,
};
use tracing::debug;

/// Default display width of image responses, in pixels
pub const DEFAULT_IMAGE_WIDTH: u32 = 300;

/// Expands payloads into fragments
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    image_width: u32,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_WIDTH)
    }
}

impl MessageFormatter {
    pub fn new(image_width: u32) -> Self {
        Self { image_width }
    }

    /// Expand a payload into fragments in server emission order.
    ///
    /// Payloads missing the text field for their author produce nothing.
    pub fn format(&self, payload: &MessagePayload, author: Author) -> Vec<Fragment> {
        match author {
            Author::User => self.format_user(payload),
            Author::Assistant => self.format_assistant(payload),
        }
    }

    fn format_user(&self, payload: &MessagePayload) -> Vec<Fragment> {
        let Some(text) = payload.input_text().filter(|t| t.is_present()) else {
            debug!("User payload without input text, nothing to render");
            return Vec::new();
        };

        let joined = text.parts().join(" ");
        let escaped = escape_html(joined.trim());
        if escaped.is_empty() {
            return Vec::new();
        }

        vec![Fragment::text(escaped, None)]
    }

    fn format_assistant(&self, payload: &MessagePayload) -> Vec<Fragment> {
        if !payload.output_text().is_some_and(|t| t.is_present()) {
            debug!("Assistant payload without output text, nothing to render");
            return Vec::new();
        }

        let Some(output) = payload.output.as_ref() else {
            return Vec::new();
        };

        output
            .generic
            .iter()
            .filter_map(|item| self.format_item(item))
            .collect()
    }

    fn format_item(&self, item: &GenericItem) -> Option<Fragment> {
        match item {
            GenericItem::Text { text } => Some(Fragment::text(text.clone(), Some(text.clone()))),
            GenericItem::Image { source, title } => {
                let html = format!(
                    "{}<div><img src=\"{}\" width=\"{}\"></div>",
                    title.as_deref().unwrap_or_default(),
                    source,
                    self.image_width
                );
                Some(Fragment::image(html))
            }
            GenericItem::Pause { time, typing } => Some(Fragment::pause(*time, *typing)),
            GenericItem::Option {
                title,
                preference,
                options,
            } => {
                let (markup, choices) = render_options(options, preference.unwrap_or_default());
                let html = format!("{}{}", title.as_deref().unwrap_or_default(), markup);

                let spoken = title
                    .iter()
                    .cloned()
                    .chain(options.iter().map(|opt| opt.label.clone()))
                    .collect();

                Some(Fragment::option(html, spoken, choices))
            }
            GenericItem::Unknown => {
                debug!("Ignoring unsupported response type");
                None
            }
        }
    }
}

/// Render an option list and collect the choices it dispatches.
///
/// Each clickable entry carries `data-option` with its index into the
/// returned choices.
fn render_options(
    options: &[OptionItem],
    preference: OptionPreference,
) -> (String, Vec<OptionChoice>) {
    let choices: Vec<OptionChoice> = options
        .iter()
        .filter_map(|opt| {
            opt.send_text().map(|text| OptionChoice {
                label: opt.label.clone(),
                text: text.to_string(),
            })
        })
        .collect();

    let markup = match preference {
        OptionPreference::Text => {
            let items: String = choices
                .iter()
                .enumerate()
                .map(|(i, choice)| {
                    format!(
                        "<li><div class=\"options-list\" data-option=\"{}\">{}</div></li>",
                        i, choice.label
                    )
                })
                .collect();
            format!("<ul>{}</ul>", items)
        }
        OptionPreference::Button => {
            let buttons: String = choices
                .iter()
                .enumerate()
                .map(|(i, choice)| {
                    format!(
                        "<div class=\"options-button\" data-option=\"{}\">{}</div>",
                        i, choice.label
                    )
                })
                .collect();
            format!("<br>{}", buttons)
        }
        OptionPreference::Other => String::new(),
    };

    (markup, choices)
}

/// Escape the characters that would otherwise be read as markup
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
