//! Structured error types for the Folio encoder.
//!
//! Only failures that make a whole document impossible are errors. A chapter
//! whose cross-reference cannot be resolved, or a glyph a font cannot answer
//! for, degrades that one element and is reported through `log` instead.

use thiserror::Error;

/// The unified error type returned by all public Folio API functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// The layout configuration was rejected before layout began.
    #[error("Invalid layout configuration: {0}")]
    InvalidConfig(String),

    /// JSON input failed to parse as a valid book.
    #[error("Failed to parse book: {source}{}", hint_suffix(.hint))]
    ParseError {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// A font could not be decoded or parsed.
    #[error("Font error: {0}")]
    FontError(String),

    /// PDF generation hit a broken invariant.
    #[error("Render error: {0}")]
    RenderError(String),

    /// Layout was stopped by the caller at a chapter boundary.
    #[error("Layout cancelled after {completed} of {total} chapters")]
    Cancelled { completed: usize, total: usize },
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the book schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::ParseError { source: e, hint }
    }
}
