//! Cross-reference resolution.
//!
//! Runs once the reading order is final. Page numbers are read straight off
//! the order, the contents pages are drawn with their numbers and links,
//! and the outline is built. A reference whose target page cannot be found
//! is dropped with a warning instead of failing the document.

use log::warn;

use crate::font::FontContext;
use crate::layout::toc::TocPlan;
use crate::layout::{Document, LinkAnnotation, PageHandle, PageKind, Rect, TextLine, TocEntry};
use crate::model::LayoutConfig;
use crate::text::{classify, measure_width, WrappedLine};

/// A bookmark pointing at a chapter's first page.
///
/// Sibling links are indices into `Outline::nodes`. A `parent` of `None`
/// means the outline root.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode {
    pub title: String,
    pub target: PageHandle,
    pub parent: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// The bookmark tree: chapters as siblings under the root, in chapter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    pub nodes: Vec<OutlineNode>,
}

impl Outline {
    /// Link the resolvable entries into a sibling list.
    pub fn build(entries: &[TocEntry], doc: &Document) -> Self {
        let resolvable: Vec<&TocEntry> = entries
            .iter()
            .filter(|entry| {
                let found = doc.page_number(entry.target).is_some();
                if !found {
                    warn!(
                        "outline entry '{}' targets a missing page (slot {}), skipping",
                        entry.title,
                        entry.target.slot()
                    );
                }
                found
            })
            .collect();

        let count = resolvable.len();
        let nodes = resolvable
            .into_iter()
            .enumerate()
            .map(|(i, entry)| OutlineNode {
                title: entry.title.clone(),
                target: entry.target,
                parent: None,
                prev: i.checked_sub(1),
                next: (i + 1 < count).then_some(i + 1),
            })
            .collect();
        Self { nodes }
    }

    pub fn first(&self) -> Option<usize> {
        (!self.nodes.is_empty()).then_some(0)
    }

    pub fn last(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    /// Number of open top-level items, as written to the root's /Count.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pass 3: draw the contents pages, link everything up, seal the document.
pub fn resolve(
    doc: &mut Document,
    toc: Option<(&TocPlan, &[PageHandle])>,
    config: &LayoutConfig,
    fonts: &FontContext,
) {
    if let Some((plan, handles)) = toc {
        draw_toc(doc, plan, handles, config, fonts);
    }

    let outline = Outline::build(doc.toc_entries(), doc);
    doc.set_outline(outline);

    if config.page_numbers {
        draw_page_numbers(doc, config, fonts);
    }

    doc.seal();
}

fn draw_toc(
    doc: &mut Document,
    plan: &TocPlan,
    handles: &[PageHandle],
    config: &LayoutConfig,
    fonts: &FontContext,
) {
    let size = config.toc_point_size;
    let line_height = config.toc_line_height();
    let right = config.page_width - config.margin;

    for (page_no, (items, &handle)) in plan.pages.iter().zip(handles).enumerate() {
        let mut y = config.page_height - config.margin;
        let mut lines = Vec::new();
        let mut annotations = Vec::new();

        if page_no == 0 && !plan.header.is_empty() {
            let size = config.title_point_size;
            for line in &plan.header {
                lines.push(line_at(line, config.margin, y - size, size));
                y -= config.title_line_height();
            }
            y -= line_height;
        }

        for item in items {
            let top = y;
            let mut last_baseline = y - size;
            for line in &item.lines {
                last_baseline = y - size;
                lines.push(line_at(line, config.margin, last_baseline, size));
                y -= line_height;
            }
            if item.lines.is_empty() {
                y -= line_height;
            }

            let entry = &doc.toc_entries()[item.entry];
            match doc.page_number(entry.target) {
                Some(number) => {
                    let label = number.to_string();
                    let width = measure_width(fonts, &label, size);
                    lines.push(TextLine {
                        x: right - width,
                        y: last_baseline,
                        font_size: size,
                        width,
                        runs: classify(&label),
                    });
                    annotations.push(LinkAnnotation {
                        rect: Rect {
                            x0: config.margin,
                            y0: y,
                            x1: right,
                            y1: top,
                        },
                        target: entry.target,
                    });
                }
                None => warn!(
                    "contents entry '{}' targets a missing page (slot {}), leaving it unlinked",
                    entry.title,
                    entry.target.slot()
                ),
            }
        }

        if let Some(page) = doc.page_mut(handle) {
            page.lines.extend(lines);
            page.annotations.extend(annotations);
        }
    }
}

fn line_at(line: &WrappedLine, x: f64, baseline: f64, font_size: f64) -> TextLine {
    TextLine {
        x,
        y: baseline,
        font_size,
        width: line.width,
        runs: line.runs.clone(),
    }
}

/// Centered page number in the bottom margin of every content page.
fn draw_page_numbers(doc: &mut Document, config: &LayoutConfig, fonts: &FontContext) {
    let size = config.body_point_size * 0.8;
    if config.margin < size {
        warn!(
            "margin {} is too small for {}pt page numbers, leaving pages unnumbered",
            config.margin, size
        );
        return;
    }
    let numbered: Vec<(PageHandle, usize)> = doc
        .handles()
        .iter()
        .filter_map(|&h| {
            let page = doc.page(h)?;
            (page.kind == PageKind::Content).then_some((h, page.index + 1))
        })
        .collect();

    for (handle, number) in numbered {
        let label = number.to_string();
        let width = measure_width(fonts, &label, size);
        if let Some(page) = doc.page_mut(handle) {
            page.lines.push(TextLine {
                x: (config.page_width - width) / 2.0,
                y: (config.margin - size) / 2.0,
                font_size: size,
                width,
                runs: classify(&label),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::toc;
    use crate::model::Metadata;

    fn doc_with_pages(n: usize) -> (Document, Vec<PageHandle>) {
        let mut doc = Document::new(Metadata::default());
        let handles = (0..n)
            .map(|_| doc.push_page(PageKind::Content, 595.28, 841.89))
            .collect();
        (doc, handles)
    }

    #[test]
    fn outline_links_siblings_in_order() {
        let (mut doc, pages) = doc_with_pages(3);
        for (i, &p) in pages.iter().enumerate() {
            doc.push_toc_entry(TocEntry {
                title: format!("Chapter {}", i + 1),
                target: p,
            });
        }
        let outline = Outline::build(doc.toc_entries(), &doc);
        assert_eq!(outline.count(), 3);
        assert_eq!(outline.first(), Some(0));
        assert_eq!(outline.last(), Some(2));
        assert_eq!(outline.nodes[0].prev, None);
        assert_eq!(outline.nodes[0].next, Some(1));
        assert_eq!(outline.nodes[1].prev, Some(0));
        assert_eq!(outline.nodes[1].next, Some(2));
        assert_eq!(outline.nodes[2].next, None);
        assert!(outline.nodes.iter().all(|n| n.parent.is_none()));
    }

    #[test]
    fn empty_outline() {
        let (doc, _) = doc_with_pages(1);
        let outline = Outline::build(&[], &doc);
        assert!(outline.is_empty());
        assert_eq!(outline.first(), None);
        assert_eq!(outline.last(), None);
    }

    #[test]
    fn unresolvable_target_is_skipped_not_fatal() {
        let config = LayoutConfig::default();
        let fonts = FontContext::new();
        let (mut doc, pages) = doc_with_pages(2);
        doc.push_toc_entry(TocEntry {
            title: "Good".to_string(),
            target: pages[0],
        });
        doc.push_toc_entry(TocEntry {
            title: "Dangling".to_string(),
            target: PageHandle(42),
        });
        doc.push_toc_entry(TocEntry {
            title: "Also good".to_string(),
            target: pages[1],
        });

        let plan = toc::plan(doc.toc_entries(), doc.page_count(), &config, &fonts);
        let handles = toc::insert_pages(&mut doc, &plan, &config);
        resolve(&mut doc, Some((&plan, &handles)), &config, &fonts);

        assert!(doc.is_sealed());
        let toc_page = doc.page(handles[0]).unwrap();
        assert_eq!(toc_page.annotations.len(), 2);
        let texts: Vec<String> = toc_page.lines.iter().map(TextLine::text).collect();
        assert!(texts.contains(&"Dangling".to_string()));
        assert!(texts.contains(&"2".to_string()));
        assert!(texts.contains(&"3".to_string()));

        assert_eq!(doc.outline().count(), 2);
        assert_eq!(doc.outline().nodes[1].title, "Also good");
        assert_eq!(doc.outline().nodes[0].next, Some(1));
    }

    #[test]
    fn page_numbers_right_aligned_on_last_title_line() {
        let config = LayoutConfig::default();
        let fonts = FontContext::new();
        let (mut doc, pages) = doc_with_pages(1);
        doc.push_toc_entry(TocEntry {
            title: "Intro".to_string(),
            target: pages[0],
        });
        let plan = toc::plan(doc.toc_entries(), doc.page_count(), &config, &fonts);
        let handles = toc::insert_pages(&mut doc, &plan, &config);
        resolve(&mut doc, Some((&plan, &handles)), &config, &fonts);

        let toc_page = doc.page(handles[0]).unwrap();
        // header, title, number
        assert_eq!(toc_page.lines.len(), 3);
        assert_eq!(toc_page.lines[0].text(), "Contents");
        let title = &toc_page.lines[1];
        let number = &toc_page.lines[2];
        assert_eq!(number.text(), "2");
        assert_eq!(number.y, title.y);
        let right = config.page_width - config.margin;
        assert!((number.x + number.width - right).abs() < 1e-9);

        let link = &toc_page.annotations[0];
        assert_eq!(link.target, pages[0]);
        assert!(link.rect.y0 < title.y && title.y < link.rect.y1);
    }

    #[test]
    fn footer_numbers_only_on_content_pages() {
        let config = LayoutConfig {
            page_numbers: true,
            ..Default::default()
        };
        let fonts = FontContext::new();
        let (mut doc, pages) = doc_with_pages(2);
        for &p in &pages {
            doc.push_toc_entry(TocEntry {
                title: "x".to_string(),
                target: p,
            });
        }
        let plan = toc::plan(doc.toc_entries(), doc.page_count(), &config, &fonts);
        let handles = toc::insert_pages(&mut doc, &plan, &config);
        resolve(&mut doc, Some((&plan, &handles)), &config, &fonts);

        assert!(doc
            .page(handles[0])
            .unwrap()
            .lines
            .iter()
            .all(|l| l.y > config.margin));
        let footer = doc.page(pages[1]).unwrap().lines.last().unwrap().clone();
        assert_eq!(footer.text(), "3");
        assert!(footer.y < config.margin);
    }
}
