//! Panel integration module
//!
//! This module provides the runtime that connects all components of the
//! conversation panel: API client -> formatter -> scheduler -> renderer,
//! plus the voice turn controller and its speech services.

mod config;
mod panel;

pub use config::PanelConfig;
pub use panel::{Panel, PanelBuilder, PanelCommand, PanelEvent, PanelHandle};
