//! # Book Model
//!
//! The input representation for the encoder. A book is an ordered list of
//! chapters, already decoded by whatever collaborator opened the source
//! (an EPUB, a folder of text files, a form field), plus metadata, layout
//! configuration and optional raw font data.
//!
//! Everything here is plain data with serde support so a book can be handed
//! over as JSON from a browser, a CLI pipe, or built directly in Rust.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::FolioError;

/// A complete book ready for layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Chapters in reading order.
    pub chapters: Vec<Chapter>,

    /// Document metadata (title, author, language).
    #[serde(default)]
    pub metadata: Metadata,

    /// Page geometry and typography.
    #[serde(default)]
    pub config: LayoutConfig,

    /// Optional TrueType fonts replacing the built-in narrow/wide fonts.
    #[serde(default)]
    pub fonts: FontSources,
}

/// One logical section of the book.
///
/// The body holds `\n\n`-separated paragraphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Paragraphs of the body, with blank ones skipped.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Document metadata embedded in the PDF. All values are opaque strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Document language (BCP 47 tag, e.g. "zh-CN"). Emitted as /Lang in the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Page geometry and typography, in points (1/72 inch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,
    /// Uniform margin on all four sides.
    pub margin: f64,
    pub body_point_size: f64,
    pub title_point_size: f64,
    pub toc_point_size: f64,
    /// Line height as a multiple of the point size.
    pub line_spacing: f64,
    /// Header drawn on the first table of contents page.
    pub toc_title: String,
    pub include_toc: bool,
    /// Start every chapter on a fresh page. When off, a chapter continues
    /// below the previous chapter's last line.
    pub chapter_page_break: bool,
    /// Draw a page number in the bottom margin of every content page.
    pub page_numbers: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin: 54.0, // ~0.75 inch
            body_point_size: 12.0,
            title_point_size: 18.0,
            toc_point_size: 12.0,
            line_spacing: 1.5,
            toc_title: "Contents".to_string(),
            include_toc: true,
            chapter_page_break: true,
            page_numbers: false,
        }
    }
}

impl LayoutConfig {
    /// Reject configurations that cannot produce a page.
    pub fn validate(&self) -> Result<(), FolioError> {
        let positive = [
            ("pageWidth", self.page_width),
            ("pageHeight", self.page_height),
            ("bodyPointSize", self.body_point_size),
            ("titlePointSize", self.title_point_size),
            ("tocPointSize", self.toc_point_size),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(FolioError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(FolioError::InvalidConfig(format!(
                "margin must be zero or positive, got {}",
                self.margin
            )));
        }
        if !self.line_spacing.is_finite() || self.line_spacing < 1.0 {
            return Err(FolioError::InvalidConfig(format!(
                "lineSpacing must be at least 1.0, got {}",
                self.line_spacing
            )));
        }
        if self.usable_width() <= 0.0 || self.usable_height() <= 0.0 {
            return Err(FolioError::InvalidConfig(format!(
                "margin {} leaves no usable area on a {}x{} page",
                self.margin, self.page_width, self.page_height
            )));
        }
        let tallest = self
            .title_line_height()
            .max(self.body_line_height())
            .max(self.toc_line_height());
        if tallest > self.usable_height() {
            return Err(FolioError::InvalidConfig(format!(
                "a {:.1}pt line does not fit in the {:.1}pt usable page height",
                tallest,
                self.usable_height()
            )));
        }
        Ok(())
    }

    pub fn usable_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    pub fn usable_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }

    pub fn body_line_height(&self) -> f64 {
        self.body_point_size * self.line_spacing
    }

    pub fn title_line_height(&self) -> f64 {
        self.title_point_size * self.line_spacing
    }

    pub fn toc_line_height(&self) -> f64 {
        self.toc_point_size * self.line_spacing
    }

    /// Vertical gap after each paragraph.
    pub fn paragraph_spacing(&self) -> f64 {
        self.body_line_height() / 2.0
    }
}

/// Raw font data supplied by the caller, one optional face per script class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontSources {
    pub narrow: Option<FontEntry>,
    pub wide: Option<FontEntry>,
}

/// A TrueType/OpenType font passed in as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontEntry {
    /// Base64-encoded font data, or a data URI (e.g. "data:font/ttf;base64,...").
    pub src: String,
}

impl FontEntry {
    /// Decode the font bytes, accepting an optional data URI prefix.
    pub fn decode(&self) -> Result<Vec<u8>, FolioError> {
        let payload = match self.src.find(";base64,") {
            Some(pos) if self.src.starts_with("data:") => &self.src[pos + ";base64,".len()..],
            _ => self.src.as_str(),
        };
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| FolioError::FontError(format!("Invalid base64 font data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_page_dimensions() {
        let config = LayoutConfig {
            page_width: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, FolioError::InvalidConfig(_)));
        assert!(err.to_string().contains("pageWidth"));

        let config = LayoutConfig {
            page_height: -10.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_margin_swallowing_page() {
        let config = LayoutConfig {
            page_width: 100.0,
            margin: 50.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nan_point_size() {
        let config = LayoutConfig {
            body_point_size: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn paragraphs_skip_blank_blocks() {
        let chapter = Chapter::new("T", "one\n\n\n\n  \n\ntwo\nstill two");
        let paras: Vec<&str> = chapter.paragraphs().collect();
        assert_eq!(paras, vec!["one", "two\nstill two"]);
    }

    #[test]
    fn book_deserializes_with_defaults() {
        let json = r#"{ "chapters": [ { "title": "One", "body": "Hello" } ] }"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.chapters.len(), 1);
        assert_eq!(book.config, LayoutConfig::default());
        assert!(book.fonts.wide.is_none());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let json = r#"{ "chapters": [], "config": { "margin": 36, "tocTitle": "目录" } }"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.config.margin, 36.0);
        assert_eq!(book.config.toc_title, "目录");
        assert_eq!(book.config.body_point_size, 12.0);
    }

    #[test]
    fn font_entry_accepts_data_uri() {
        let plain = FontEntry { src: "AAEC".to_string() };
        let uri = FontEntry {
            src: "data:font/ttf;base64,AAEC".to_string(),
        };
        assert_eq!(plain.decode().unwrap(), vec![0, 1, 2]);
        assert_eq!(uri.decode().unwrap(), vec![0, 1, 2]);
        assert!(FontEntry { src: "!!!".to_string() }.decode().is_err());
    }
}
