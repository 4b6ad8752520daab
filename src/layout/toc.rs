//! Table of contents sizing and placement.
//!
//! How many contents pages a book needs depends only on how the chapter
//! titles wrap at the contents font size, never on page numbers. So the
//! plan is made first, that many blank pages are spliced in front of the
//! content, and only then are the final page numbers known.

use log::warn;

use crate::font::FontContext;
use crate::layout::{Document, PageHandle, PageKind, TocEntry};
use crate::model::LayoutConfig;
use crate::text::{measure_width, wrap, WrappedLine};

/// One entry as it will be drawn on a contents page.
#[derive(Debug, Clone)]
pub struct TocItem {
    /// Index into the document's TOC entries.
    pub entry: usize,
    /// The title wrapped at the contents width. May be empty for an untitled
    /// chapter, which still takes one line.
    pub lines: Vec<WrappedLine>,
}

impl TocItem {
    /// Lines this entry occupies on its page.
    pub fn line_count(&self) -> usize {
        self.lines.len().max(1)
    }
}

/// Entries grouped by contents page, in order.
#[derive(Debug, Clone, Default)]
pub struct TocPlan {
    pub pages: Vec<Vec<TocItem>>,
    /// Wrapped lines of the header on the first contents page.
    pub header: Vec<WrappedLine>,
}

impl TocPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Width kept free at the right of every entry for its page number.
///
/// The final page count is not known yet, but it cannot exceed the content
/// pages plus one contents page per entry.
pub fn number_reserve(fonts: &FontContext, config: &LayoutConfig, max_page: usize) -> f64 {
    let digits = max_page.to_string().len().max(3);
    let widest = "9".repeat(digits);
    measure_width(fonts, &widest, config.toc_point_size) + config.toc_point_size / 2.0
}

/// Wrapped header lines and the vertical space they take on the first page.
///
/// The header is cut short so that at least one entry line still fits below
/// it on the first contents page.
pub fn header(fonts: &FontContext, config: &LayoutConfig) -> (Vec<WrappedLine>, f64) {
    let mut lines = wrap(
        fonts,
        &config.toc_title,
        config.usable_width(),
        config.title_point_size,
    );
    let room = config.usable_height() - 2.0 * config.toc_line_height();
    let max_lines = (room / config.title_line_height() + 1e-9).floor().max(0.0) as usize;
    if lines.len() > max_lines {
        warn!(
            "contents title needs {} lines but only {} fit above the first entry; truncating",
            lines.len(),
            max_lines
        );
        lines.truncate(max_lines);
    }
    let height = if lines.is_empty() {
        0.0
    } else {
        lines.len() as f64 * config.title_line_height() + config.toc_line_height()
    };
    (lines, height)
}

/// Lines per contents page: (first page, later pages).
pub fn capacity(fonts: &FontContext, config: &LayoutConfig) -> (usize, usize) {
    let (_, header_height) = header(fonts, config);
    capacity_below(header_height, config)
}

fn capacity_below(header_height: f64, config: &LayoutConfig) -> (usize, usize) {
    let line_height = config.toc_line_height();
    let full = (config.usable_height() / line_height + 1e-9).floor() as usize;
    let first = ((config.usable_height() - header_height) / line_height + 1e-9)
        .floor()
        .max(0.0) as usize;
    (first, full)
}

/// Pack entries onto contents pages greedily.
///
/// An entry never straddles two pages. One that does not fit in what is
/// left of a page moves to the next, unless the page is still empty, in
/// which case it stays so no contents page is ever blank.
pub fn plan(
    entries: &[TocEntry],
    content_pages: usize,
    config: &LayoutConfig,
    fonts: &FontContext,
) -> TocPlan {
    if entries.is_empty() {
        return TocPlan::default();
    }

    let reserve = number_reserve(fonts, config, content_pages + entries.len());
    let width = (config.usable_width() - reserve).max(0.0);
    let (header_lines, header_height) = header(fonts, config);
    let (first_capacity, full_capacity) = capacity_below(header_height, config);

    let mut pages = Vec::new();
    let mut current: Vec<TocItem> = Vec::new();
    let mut available = first_capacity;
    let mut drawn = 0usize;

    for (index, entry) in entries.iter().enumerate() {
        let item = TocItem {
            entry: index,
            lines: wrap(fonts, &entry.title, width, config.toc_point_size),
        };
        let needed = item.line_count();
        if drawn > 0 && drawn + needed > available {
            pages.push(std::mem::take(&mut current));
            available = full_capacity;
            drawn = 0;
        }
        drawn += needed;
        current.push(item);
    }
    if !current.is_empty() {
        pages.push(current);
    }

    TocPlan {
        pages,
        header: header_lines,
    }
}

/// Splice one blank contents page per planned page in front of the content.
pub fn insert_pages(doc: &mut Document, plan: &TocPlan, config: &LayoutConfig) -> Vec<PageHandle> {
    doc.insert_front(
        plan.page_count(),
        PageKind::Toc,
        config.page_width,
        config.page_height,
    )
}
