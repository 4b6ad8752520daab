//! # Folio
//!
//! A paginated document encoder: chapters in, PDF out.
//!
//! A book is a list of chapters, each a title and a body that may freely mix
//! Latin and CJK text. Folio wraps and paginates them, puts a table of
//! contents in front whose page numbers link to the chapters, and adds a
//! bookmark outline.
//!
//! The table of contents is the interesting part. Its page numbers are only
//! known once everything after it is laid out, and how many pages it takes
//! shifts everything after it. Layout therefore runs in passes over a page
//! arena, and cross-references are back-patched once the order is final.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]    : Books of chapters with metadata, layout config, font sources
//!       ↓
//!   [text]     : Script runs, measurement, line wrapping
//!       ↓
//!   [layout]   : Content pass, TOC placement, cross-reference resolution
//!       ↓
//!   [pdf]      : Serialize to PDF bytes
//! ```

pub mod error;
pub mod font;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::FolioError;
pub use font::FontContext;
pub use layout::{Document, LayoutEngine};
pub use model::{Book, Chapter, LayoutConfig, Metadata};

use pdf::PdfWriter;

/// Render a book to PDF bytes.
///
/// This is the primary entry point. Fonts come from the book's own sources,
/// falling back to the built-in faces.
pub fn render(book: &Book) -> Result<Vec<u8>, FolioError> {
    let fonts = FontContext::from_sources(&book.fonts)?;
    render_with(book, &fonts)
}

/// Render a book with a caller-supplied font context.
pub fn render_with(book: &Book, fonts: &FontContext) -> Result<Vec<u8>, FolioError> {
    let doc = layout(book, fonts)?;
    PdfWriter::new().write(&doc, fonts)
}

/// Lay a book out without serializing it.
///
/// The returned document is sealed: page numbers, contents links and the
/// outline are final.
pub fn layout(book: &Book, fonts: &FontContext) -> Result<Document, FolioError> {
    let engine = LayoutEngine::new(book.config.clone())?;
    engine.layout(&book.chapters, &book.metadata, fonts)
}

/// Render a book described as JSON to PDF bytes.
pub fn render_json(json: &str) -> Result<Vec<u8>, FolioError> {
    let book: Book = serde_json::from_str(json)?;
    render(&book)
}

/// Render independent books, one result per book in input order.
#[cfg(feature = "parallel")]
pub fn render_batch(books: &[Book]) -> Vec<Result<Vec<u8>, FolioError>> {
    use rayon::prelude::*;
    books.par_iter().map(render).collect()
}

/// Render independent books, one result per book in input order.
#[cfg(not(feature = "parallel"))]
pub fn render_batch(books: &[Book]) -> Vec<Result<Vec<u8>, FolioError>> {
    books.iter().map(render).collect()
}
