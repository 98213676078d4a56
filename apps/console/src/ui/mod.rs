//! Terminal rendering for backend events.

pub mod render;

pub use render::{help_text, run};
