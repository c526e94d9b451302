pub mod format;
pub mod storage;
pub mod types;

pub use format::{escape_html, MessageFormatter};
pub use storage::{TranscriptEntry, TranscriptLog};
pub use types::{
    Author, Fragment, FragmentKind, GenericItem, MessagePayload, OptionChoice, PauseDirective,
    SpokenText, TextValue,
};
