//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, title/tab/status bars and overlays
//! - `input`: keyboard handling
//! - `styles`: colors and text styles
//! - `guard`: the spinner and denied views shown in place of a protected tab
//! - `form`: the dialog used by every form
//! - `tabs`: tab content

pub mod form;
pub mod guard;
pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
