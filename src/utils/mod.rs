//! Shared utility functions.
//!
//! - `filename`: filesystem-safe names for downloaded charts
//! - `format`: Human-readable formatting (sizes, speeds)

mod filename;
mod format;

pub use filename::{chart_filename, sanitize_filename, MAX_FILENAME_CHARS};
pub use format::{format_size, format_speed};
