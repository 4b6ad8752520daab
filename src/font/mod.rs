//! # Font Management
//!
//! Metrics providers for the two script classes the encoder distinguishes.
//!
//! The encoder never loads fonts itself. The caller hands over one face for
//! narrow (Latin-like) text and one for wide (CJK) text, either one of the
//! built-in faces that need no embedding or raw TrueType bytes parsed with
//! ttf-parser. Layout asks these providers for advance widths, and the PDF
//! writer asks them how to encode and embed the glyphs.

pub mod metrics;

use std::collections::HashMap;

use thiserror::Error;

use crate::error::FolioError;
use crate::model::FontSources;
use crate::text::Script;

/// A provider could not answer for a glyph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FontError {
    #[error("font '{font}' has no glyph for {ch:?} (U+{:04X})", codepoint(.ch))]
    MissingGlyph { ch: char, font: String },
}

fn codepoint(ch: &char) -> u32 {
    *ch as u32
}

/// Advance-width lookup for one font face.
pub trait FontMetrics {
    /// Display name used in diagnostics.
    fn name(&self) -> &str;

    /// Advance width of one character in points, or `None` when the face
    /// cannot show it.
    fn char_width(&self, ch: char, font_size: f64) -> Option<f64>;

    /// Advance width of a whole run in points.
    fn advance_width(&self, text: &str, font_size: f64) -> Result<f64, FontError> {
        let mut width = 0.0;
        for ch in text.chars() {
            match self.char_width(ch, font_size) {
                Some(w) => width += w,
                None => {
                    return Err(FontError::MissingGlyph {
                        ch,
                        font: self.name().to_string(),
                    })
                }
            }
        }
        Ok(width)
    }
}

/// Standard PDF fonts with built-in metrics. No embedding needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
        }
    }
}

impl FontMetrics for StandardFont {
    fn name(&self) -> &str {
        self.pdf_name()
    }

    fn char_width(&self, ch: char, font_size: f64) -> Option<f64> {
        let byte = metrics::unicode_to_winansi(ch)?;
        let units = match self {
            Self::Helvetica => metrics::helvetica_width(byte),
        };
        Some(units as f64 / 1000.0 * font_size)
    }
}

/// Predefined CJK fonts that PDF viewers ship with. Referenced by name,
/// never embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CjkFont {
    /// Adobe-GB1 Song, the Simplified Chinese default.
    StSongLight,
}

impl CjkFont {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::StSongLight => "STSong-Light",
        }
    }

    /// CMap used to address glyphs with UTF-16BE codes.
    pub fn encoding(&self) -> &'static str {
        match self {
            Self::StSongLight => "UniGB-UTF16-H",
        }
    }

    pub fn ordering(&self) -> &'static str {
        match self {
            Self::StSongLight => "GB1",
        }
    }
}

impl FontMetrics for CjkFont {
    fn name(&self) -> &str {
        self.pdf_name()
    }

    fn char_width(&self, ch: char, font_size: f64) -> Option<f64> {
        if ch.is_control() {
            return None;
        }
        // Ideographs and fullwidth forms take a full em; proportional Latin
        // in Adobe-GB1 is close enough to half an em.
        let em = if Script::of(ch) == Script::Wide { 1.0 } else { 0.5 };
        Some(em * font_size)
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub family: String,
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub ascender: i16,
    pub descender: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Result<Self, FolioError> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| FolioError::FontError(format!("Failed to parse font data: {}", e)))?;

        let family = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::FAMILY)
            .find_map(|n| n.to_string())
            .unwrap_or_else(|| "CustomFont".to_string());

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();

        // Walk the BMP to build width and glyph ID maps
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                }
            }
        }

        Ok(CustomFontMetrics {
            family,
            units_per_em: face.units_per_em(),
            advance_widths,
            ascender: face.ascender(),
            descender: face.descender(),
            glyph_ids,
        })
    }
}

impl FontMetrics for CustomFontMetrics {
    fn name(&self) -> &str {
        &self.family
    }

    fn char_width(&self, ch: char, font_size: f64) -> Option<f64> {
        let w = *self.advance_widths.get(&ch)?;
        Some((w as f64 / self.units_per_em as f64) * font_size)
    }
}

/// A font face the encoder can measure with and emit.
#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A predefined CJK font. No embedding needed.
    Cjk(CjkFont),
    /// A TrueType/OpenType font that gets embedded.
    Custom {
        data: Vec<u8>,
        metrics: CustomFontMetrics,
    },
}

impl FontData {
    /// Parse raw TrueType/OpenType bytes into an embeddable face.
    pub fn custom(data: Vec<u8>) -> Result<Self, FolioError> {
        let metrics = CustomFontMetrics::from_font_data(&data)?;
        Ok(FontData::Custom { data, metrics })
    }
}

impl FontMetrics for FontData {
    fn name(&self) -> &str {
        match self {
            FontData::Standard(f) => f.name(),
            FontData::Cjk(f) => f.name(),
            FontData::Custom { metrics, .. } => metrics.name(),
        }
    }

    fn char_width(&self, ch: char, font_size: f64) -> Option<f64> {
        match self {
            FontData::Standard(f) => f.char_width(ch, font_size),
            FontData::Cjk(f) => f.char_width(ch, font_size),
            FontData::Custom { metrics, .. } => metrics.char_width(ch, font_size),
        }
    }
}

/// The pair of faces used by layout and PDF serialization.
#[derive(Debug, Clone)]
pub struct FontContext {
    narrow: FontData,
    wide: FontData,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    /// Helvetica for narrow text, STSong-Light for wide text.
    pub fn new() -> Self {
        Self::with_fonts(
            FontData::Standard(StandardFont::Helvetica),
            FontData::Cjk(CjkFont::StSongLight),
        )
    }

    pub fn with_fonts(narrow: FontData, wide: FontData) -> Self {
        Self { narrow, wide }
    }

    /// Build a context from caller-supplied font bytes, keeping the built-in
    /// face for any script without one.
    pub fn from_sources(sources: &FontSources) -> Result<Self, FolioError> {
        let mut context = Self::new();
        if let Some(entry) = &sources.narrow {
            context.narrow = FontData::custom(entry.decode()?)?;
        }
        if let Some(entry) = &sources.wide {
            context.wide = FontData::custom(entry.decode()?)?;
        }
        Ok(context)
    }

    /// The face responsible for a script class.
    pub fn font(&self, script: Script) -> &FontData {
        match script {
            Script::Narrow => &self.narrow,
            Script::Wide => &self.wide,
        }
    }

    /// Glyph drawn in place of characters the face cannot show.
    pub fn placeholder(&self, script: Script) -> char {
        match script {
            Script::Narrow => '?',
            Script::Wide => '\u{3000}',
        }
    }

    /// Width of the placeholder glyph, zero if even that is missing.
    pub fn placeholder_width(&self, script: Script, font_size: f64) -> f64 {
        self.font(script)
            .char_width(self.placeholder(script), font_size)
            .unwrap_or(0.0)
    }
}
