//! # Page Layout Engine
//!
//! Turns chapters into pages in three ordered passes:
//!
//! 1. **Content** (this module): every chapter starts on a fresh page, its
//!    heading and paragraphs are wrapped and placed line by line, and the
//!    page each chapter starts on is recorded as a `TocEntry`.
//! 2. **TOC placement** (`toc`): the number of contents pages depends only on
//!    how the chapter titles wrap, so it is computed first and that many
//!    blank pages are spliced in front of the content.
//! 3. **Resolution** (`resolve`): with the final page order fixed, page
//!    numbers are known. The contents pages are drawn, their links point at
//!    the chapter pages, and the outline is linked up.
//!
//! Pages live in an arena owned by the `Document`. Everything that points at
//! a page (TOC entries, links, outline nodes) holds a `PageHandle`, which is
//! a plain index into that arena. Inserting the contents pages changes the
//! reading order but never moves a page inside the arena, so handles taken
//! in pass 1 stay valid.

pub mod resolve;
pub mod toc;

use std::ops::ControlFlow;

use log::debug;
use serde::Serialize;

use crate::error::FolioError;
use crate::font::FontContext;
use crate::model::{Chapter, LayoutConfig, Metadata};
use crate::text::{wrap, ScriptRun, WrappedLine};

pub use resolve::{Outline, OutlineNode};
pub use toc::{TocItem, TocPlan};

/// Tolerance for the "does this line still fit" comparison.
const FIT_EPSILON: f64 = 1e-6;

/// Non-owning reference to a page in a document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageHandle(usize);

impl PageHandle {
    /// Arena slot of the page. Stable for the life of the document.
    pub fn slot(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageKind {
    Content,
    Toc,
}

/// One positioned line of text. Coordinates are PDF user space: origin at
/// the bottom-left corner, `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub width: f64,
    pub runs: Vec<ScriptRun>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// An axis-aligned rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// A clickable area that jumps to another page of the same document.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    pub rect: Rect,
    pub target: PageHandle,
}

#[derive(Debug, Clone)]
pub struct Page {
    /// Position in the final reading order, zero-based.
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub kind: PageKind,
    pub lines: Vec<TextLine>,
    pub annotations: Vec<LinkAnnotation>,
}

/// A table of contents entry: a chapter title and the page it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub target: PageHandle,
}

/// Owner of all pages, the contents entries and the outline.
#[derive(Debug, Clone)]
pub struct Document {
    pages: Vec<Page>,
    order: Vec<PageHandle>,
    toc_entries: Vec<TocEntry>,
    outline: Outline,
    metadata: Metadata,
    toc_page_count: usize,
    sealed: bool,
}

impl Document {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            pages: Vec::new(),
            order: Vec::new(),
            toc_entries: Vec::new(),
            outline: Outline::default(),
            metadata,
            toc_page_count: 0,
            sealed: false,
        }
    }

    /// Pages in final reading order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.order.iter().map(move |h| &self.pages[h.0])
    }

    /// Handles in final reading order.
    pub fn handles(&self) -> &[PageHandle] {
        &self.order
    }

    pub fn page(&self, handle: PageHandle) -> Option<&Page> {
        self.pages.get(handle.0)
    }

    pub(crate) fn page_mut(&mut self, handle: PageHandle) -> Option<&mut Page> {
        self.pages.get_mut(handle.0)
    }

    pub fn page_count(&self) -> usize {
        self.order.len()
    }

    /// 1-based page number of a page in the final order.
    pub fn page_number(&self, handle: PageHandle) -> Option<usize> {
        self.page(handle).map(|p| p.index + 1)
    }

    pub fn toc_entries(&self) -> &[TocEntry] {
        &self.toc_entries
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of contents pages spliced in front of the content.
    pub fn toc_page_count(&self) -> usize {
        self.toc_page_count
    }

    /// Whether page numbers have been frozen by the resolution pass.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn set_outline(&mut self, outline: Outline) {
        self.outline = outline;
    }

    pub(crate) fn push_toc_entry(&mut self, entry: TocEntry) {
        self.toc_entries.push(entry);
    }

    /// Append a new blank page at the end of the reading order.
    pub(crate) fn push_page(&mut self, kind: PageKind, width: f64, height: f64) -> PageHandle {
        let handle = PageHandle(self.pages.len());
        self.pages.push(Page {
            index: self.order.len(),
            width,
            height,
            kind,
            lines: Vec::new(),
            annotations: Vec::new(),
        });
        self.order.push(handle);
        handle
    }

    /// Splice `count` blank pages in at the front of the reading order and
    /// renumber every page. Existing pages keep their arena slot.
    pub(crate) fn insert_front(
        &mut self,
        count: usize,
        kind: PageKind,
        width: f64,
        height: f64,
    ) -> Vec<PageHandle> {
        let mut inserted = Vec::with_capacity(count);
        for _ in 0..count {
            let handle = PageHandle(self.pages.len());
            self.pages.push(Page {
                index: 0,
                width,
                height,
                kind,
                lines: Vec::new(),
                annotations: Vec::new(),
            });
            inserted.push(handle);
        }
        let mut order = inserted.clone();
        order.extend_from_slice(&self.order);
        self.order = order;
        if kind == PageKind::Toc {
            self.toc_page_count += count;
        }
        self.reindex();
        inserted
    }

    fn reindex(&mut self) {
        for (position, handle) in self.order.iter().enumerate() {
            self.pages[handle.0].index = position;
        }
    }

    /// Serializable snapshot of the layout, for debugging and tooling.
    pub fn info(&self) -> LayoutInfo {
        LayoutInfo {
            page_count: self.page_count(),
            toc_page_count: self.toc_page_count,
            pages: self
                .pages()
                .map(|p| PageInfo {
                    number: p.index + 1,
                    kind: p.kind,
                    lines: p.lines.iter().map(TextLine::text).collect(),
                    links: p.annotations.len(),
                })
                .collect(),
            chapters: self
                .toc_entries
                .iter()
                .map(|e| ChapterInfo {
                    title: e.title.clone(),
                    page: self.page_number(e.target),
                })
                .collect(),
        }
    }
}

/// Complete layout metadata for all pages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub page_count: usize,
    pub toc_page_count: usize,
    pub pages: Vec<PageInfo>,
    pub chapters: Vec<ChapterInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub number: usize,
    pub kind: PageKind,
    pub lines: Vec<String>,
    pub links: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

/// Reported to the progress hook after each chapter is placed.
#[derive(Debug, Clone, Copy)]
pub struct ChapterProgress<'a> {
    /// Zero-based index of the chapter just placed.
    pub index: usize,
    pub total: usize,
    pub title: &'a str,
    /// Pages created so far.
    pub pages: usize,
}

/// Tracks where we are on the current page during layout.
struct PageCursor<'a> {
    config: &'a LayoutConfig,
    page: Option<PageHandle>,
    y: f64,
}

impl<'a> PageCursor<'a> {
    fn new(config: &'a LayoutConfig) -> Self {
        Self {
            config,
            page: None,
            y: config.page_height - config.margin,
        }
    }

    fn new_page(&mut self, doc: &mut Document) -> PageHandle {
        let handle = doc.push_page(
            PageKind::Content,
            self.config.page_width,
            self.config.page_height,
        );
        self.page = Some(handle);
        self.y = self.config.page_height - self.config.margin;
        handle
    }

    /// The page a line of `line_height` lands on, breaking if it doesn't fit.
    fn ensure_room(&mut self, doc: &mut Document, line_height: f64) -> PageHandle {
        match self.page {
            Some(handle) if self.y - line_height >= self.config.margin - FIT_EPSILON => handle,
            _ => self.new_page(doc),
        }
    }

    fn draw(&mut self, doc: &mut Document, line: WrappedLine, font_size: f64, line_height: f64) {
        let handle = self.ensure_room(doc, line_height);
        let text_line = TextLine {
            x: self.config.margin,
            y: self.y - font_size,
            font_size,
            width: line.width,
            runs: line.runs,
        };
        if let Some(page) = doc.page_mut(handle) {
            page.lines.push(text_line);
        }
        self.y -= line_height;
    }

    fn skip(&mut self, gap: f64) {
        self.y -= gap;
    }
}

pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    /// Create an engine, rejecting configurations that cannot lay out a page.
    pub fn new(config: LayoutConfig) -> Result<Self, FolioError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Run all three passes and return a sealed document.
    pub fn layout(
        &self,
        chapters: &[Chapter],
        metadata: &Metadata,
        fonts: &FontContext,
    ) -> Result<Document, FolioError> {
        self.layout_with(chapters, metadata, fonts, |_| ControlFlow::Continue(()))
    }

    /// Like `layout`, calling `on_chapter` after each chapter is placed.
    ///
    /// Returning `ControlFlow::Break` stops at that chapter boundary with
    /// `FolioError::Cancelled`. A host UI can use the hook to yield.
    pub fn layout_with<F>(
        &self,
        chapters: &[Chapter],
        metadata: &Metadata,
        fonts: &FontContext,
        on_chapter: F,
    ) -> Result<Document, FolioError>
    where
        F: FnMut(ChapterProgress<'_>) -> ControlFlow<()>,
    {
        let mut doc = self.layout_content(chapters, metadata, fonts, on_chapter)?;
        debug!(
            "content pass: {} chapters on {} pages",
            chapters.len(),
            doc.page_count()
        );

        let toc_pages = if self.config.include_toc {
            let plan = toc::plan(doc.toc_entries(), doc.page_count(), &self.config, fonts);
            let handles = toc::insert_pages(&mut doc, &plan, &self.config);
            debug!("toc pass: {} contents pages", handles.len());
            Some((plan, handles))
        } else {
            None
        };

        let toc = toc_pages.as_ref().map(|(plan, handles)| (plan, handles.as_slice()));
        resolve::resolve(&mut doc, toc, &self.config, fonts);
        debug!("resolve pass: {} pages sealed", doc.page_count());

        Ok(doc)
    }

    /// Pass 1: lay every chapter out on content pages.
    pub fn layout_content<F>(
        &self,
        chapters: &[Chapter],
        metadata: &Metadata,
        fonts: &FontContext,
        mut on_chapter: F,
    ) -> Result<Document, FolioError>
    where
        F: FnMut(ChapterProgress<'_>) -> ControlFlow<()>,
    {
        let mut doc = Document::new(metadata.clone());
        let mut cursor = PageCursor::new(&self.config);

        for (index, chapter) in chapters.iter().enumerate() {
            self.place_chapter_heading(&mut doc, &mut cursor, &chapter.title, fonts);
            for paragraph in chapter.paragraphs() {
                self.place_paragraph(&mut doc, &mut cursor, paragraph, fonts);
            }

            let progress = ChapterProgress {
                index,
                total: chapters.len(),
                title: &chapter.title,
                pages: doc.page_count(),
            };
            if on_chapter(progress).is_break() {
                return Err(FolioError::Cancelled {
                    completed: index + 1,
                    total: chapters.len(),
                });
            }
        }

        Ok(doc)
    }

    /// Start a chapter: pick its first page, record it, draw the title.
    fn place_chapter_heading(
        &self,
        doc: &mut Document,
        cursor: &mut PageCursor<'_>,
        title: &str,
        fonts: &FontContext,
    ) {
        let config = &self.config;
        let first_page = if config.chapter_page_break {
            cursor.new_page(doc)
        } else {
            cursor.ensure_room(doc, config.title_line_height())
        };
        doc.push_toc_entry(TocEntry {
            title: title.to_string(),
            target: first_page,
        });

        for line in wrap(fonts, title, config.usable_width(), config.title_point_size) {
            cursor.draw(doc, line, config.title_point_size, config.title_line_height());
        }
        cursor.skip(config.body_line_height() / 2.0);
    }

    fn place_paragraph(
        &self,
        doc: &mut Document,
        cursor: &mut PageCursor<'_>,
        text: &str,
        fonts: &FontContext,
    ) {
        let config = &self.config;
        for line in wrap(fonts, text, config.usable_width(), config.body_point_size) {
            cursor.draw(doc, line, config.body_point_size, config.body_line_height());
        }
        cursor.skip(config.paragraph_spacing());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: LayoutConfig) -> LayoutEngine {
        LayoutEngine::new(config).unwrap()
    }

    fn content(engine: &LayoutEngine, chapters: &[Chapter]) -> Document {
        engine
            .layout_content(chapters, &Metadata::default(), &FontContext::new(), |_| {
                ControlFlow::Continue(())
            })
            .unwrap()
    }

    /// Config whose usable height holds exactly `n` body lines.
    fn config_with_body_lines(n: usize) -> LayoutConfig {
        let base = LayoutConfig::default();
        let height = base.body_line_height() * n as f64 + 2.0 * base.margin;
        LayoutConfig {
            page_height: height,
            ..base
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = LayoutConfig {
            page_height: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            LayoutEngine::new(config),
            Err(FolioError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_body_gives_heading_only_page() {
        let e = engine(LayoutConfig::default());
        let doc = content(&e, &[Chapter::new("Lonely", "")]);
        assert_eq!(doc.page_count(), 1);
        let page = doc.pages().next().unwrap();
        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].text(), "Lonely");
        assert_eq!(page.lines[0].font_size, 18.0);
    }

    #[test]
    fn every_chapter_starts_a_page() {
        let e = engine(LayoutConfig::default());
        let doc = content(
            &e,
            &[
                Chapter::new("One", "short"),
                Chapter::new("Two", "short"),
                Chapter::new("Three", "short"),
            ],
        );
        assert_eq!(doc.page_count(), 3);
        let numbers: Vec<usize> = doc
            .toc_entries()
            .iter()
            .map(|e| doc.page_number(e.target).unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn chapters_share_pages_without_forced_break() {
        let e = engine(LayoutConfig {
            chapter_page_break: false,
            ..Default::default()
        });
        let doc = content(
            &e,
            &[Chapter::new("One", "short"), Chapter::new("Two", "short")],
        );
        assert_eq!(doc.page_count(), 1);
        let targets: Vec<PageHandle> = doc.toc_entries().iter().map(|e| e.target).collect();
        assert_eq!(targets[0], targets[1]);
    }

    #[test]
    fn first_line_sits_below_top_margin() {
        let config = LayoutConfig::default();
        let e = engine(config.clone());
        let doc = content(&e, &[Chapter::new("Title", "Body")]);
        let page = doc.pages().next().unwrap();
        assert_eq!(page.lines[0].x, config.margin);
        assert!(
            (page.lines[0].y - (config.page_height - config.margin - config.title_point_size))
                .abs()
                < 1e-9
        );
        // Body follows the heading, lower on the page
        assert!(page.lines[1].y < page.lines[0].y);
    }

    #[test]
    fn long_chapter_breaks_onto_second_page() {
        // Usable height holds 30 body lines and the usable width one word,
        // so a 40-word paragraph wraps to 40 lines.
        let base = config_with_body_lines(30);
        let config = LayoutConfig {
            page_width: 2.0 * base.margin + 50.0,
            ..base
        };
        let e = engine(config);
        let words: Vec<String> = (0..40).map(|i| format!("line{:02}", i)).collect();
        let doc = content(&e, &[Chapter::new("Long", words.join(" "))]);

        assert_eq!(doc.page_count(), 2);
        let first = doc.pages().next().unwrap();
        assert_eq!(first.lines[0].text(), "Long");
        let body_lines = doc.pages().map(|p| p.lines.len()).sum::<usize>() - 1;
        assert_eq!(body_lines, 40);
        assert_eq!(doc.page_number(doc.toc_entries()[0].target), Some(1));
    }

    #[test]
    fn no_line_drawn_inside_bottom_margin() {
        let config = config_with_body_lines(10);
        let e = engine(config.clone());
        let body = "word ".repeat(400);
        let doc = content(&e, &[Chapter::new("Dense", body)]);
        assert!(doc.page_count() > 1);
        for page in doc.pages() {
            for line in &page.lines {
                assert!(line.y >= config.margin - 1e-6, "baseline {} in margin", line.y);
            }
        }
    }

    #[test]
    fn page_monotonicity() {
        let e = engine(config_with_body_lines(12));
        let chapters: Vec<Chapter> = (0..8)
            .map(|i| Chapter::new(format!("Chapter {}", i), "text ".repeat(i * 60)))
            .collect();
        let doc = content(&e, &chapters);
        let numbers: Vec<usize> = doc
            .toc_entries()
            .iter()
            .map(|e| doc.page_number(e.target).unwrap())
            .collect();
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(numbers.len(), 8);
    }

    #[test]
    fn progress_hook_can_cancel() {
        let e = engine(LayoutConfig::default());
        let chapters: Vec<Chapter> = (0..5)
            .map(|i| Chapter::new(format!("C{}", i), "body"))
            .collect();
        let mut seen = Vec::new();
        let result = e.layout_with(&chapters, &Metadata::default(), &FontContext::new(), |p| {
            seen.push(p.index);
            if p.index == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert!(matches!(
            result,
            Err(FolioError::Cancelled {
                completed: 3,
                total: 5
            })
        ));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn insert_front_reindexes_without_moving() {
        let mut doc = Document::new(Metadata::default());
        let a = doc.push_page(PageKind::Content, 100.0, 100.0);
        let b = doc.push_page(PageKind::Content, 100.0, 100.0);
        let inserted = doc.insert_front(2, PageKind::Toc, 100.0, 100.0);
        assert_eq!(doc.handles(), &[inserted[0], inserted[1], a, b]);
        assert_eq!(doc.page_number(a), Some(3));
        assert_eq!(doc.page_number(b), Some(4));
        assert_eq!(doc.page_number(inserted[0]), Some(1));
        assert_eq!(a.slot(), 0);
        assert_eq!(doc.toc_page_count(), 2);
        assert_eq!(doc.page_number(PageHandle(99)), None);
    }
}
