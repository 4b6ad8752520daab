//! Greedy line wrapping over atomic segments.
//!
//! Text is cut into segments that may never be split: one wide character,
//! one Latin word (`[\w'-]+`), one whitespace run, or one punctuation
//! character. Segments are appended to the current line until the next one
//! would overflow, at which point the line is flushed. A segment wider than
//! the whole line still gets a line to itself; words and ideographs are
//! never broken internally.

use crate::font::FontContext;
use crate::text::script::{classify, Script, ScriptRun};
use crate::text::{measure_run, measure_width};

/// What a segment is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A single wide (CJK) character.
    Wide,
    /// A run of word characters, apostrophes and hyphens.
    Word,
    /// A run of whitespace.
    Space,
    /// A single character that is none of the above.
    Punct,
}

/// The smallest unit the wrapper may place at a line boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub kind: SegmentKind,
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '\'' || ch == '-'
}

fn kind_of(ch: char) -> SegmentKind {
    if Script::of(ch) == Script::Wide {
        SegmentKind::Wide
    } else if ch.is_whitespace() {
        SegmentKind::Space
    } else if is_word_char(ch) {
        SegmentKind::Word
    } else {
        SegmentKind::Punct
    }
}

/// Cut `text` into segments, in order. Concatenating them gives back `text`.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut result = Vec::new();
    let mut start: Option<(usize, SegmentKind)> = None;

    for (idx, ch) in text.char_indices() {
        let kind = kind_of(ch);
        if let Some((s, k)) = start {
            let extends = k == kind && matches!(kind, SegmentKind::Word | SegmentKind::Space);
            if extends {
                continue;
            }
            result.push(Segment { text: &text[s..idx], kind: k });
        }
        start = Some((idx, kind));
    }
    if let Some((s, k)) = start {
        result.push(Segment { text: &text[s..], kind: k });
    }
    result
}

/// A finished line: script runs whose summed advance fits the wrap width,
/// unless the line is a single oversize segment.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    pub runs: Vec<ScriptRun>,
    pub width: f64,
}

impl WrappedLine {
    fn from_text(fonts: &FontContext, text: &str, font_size: f64) -> Self {
        let runs = classify(text);
        let width = runs.iter().map(|r| measure_run(fonts, r, font_size)).sum();
        Self { runs, width }
    }

    /// The line's text with runs joined.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Wrap `text` into lines no wider than `max_width` at `font_size`.
///
/// Whitespace runs collapse to a single space, lines are trimmed at both
/// ends and empty lines are dropped.
pub fn wrap(fonts: &FontContext, text: &str, max_width: f64, font_size: f64) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut current = String::new();

    let flush = |line: &str, lines: &mut Vec<WrappedLine>| {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(WrappedLine::from_text(fonts, trimmed, font_size));
        }
    };

    for segment in segments(text) {
        let piece = match segment.kind {
            SegmentKind::Space => " ",
            _ => segment.text,
        };
        if current.is_empty() && segment.kind == SegmentKind::Space {
            continue;
        }

        let mut candidate = String::with_capacity(current.len() + piece.len());
        candidate.push_str(&current);
        candidate.push_str(piece);

        let has_content = !current.trim().is_empty();
        if has_content && measure_width(fonts, &candidate, font_size) > max_width {
            flush(&current, &mut lines);
            current = piece.trim_start().to_string();
        } else {
            current = candidate;
        }
    }
    flush(&current, &mut lines);

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fonts() -> FontContext {
        FontContext::new()
    }

    fn texts(lines: &[WrappedLine]) -> Vec<String> {
        lines.iter().map(|l| l.text()).collect()
    }

    #[test]
    fn segments_cover_input() {
        let text = "It's a well-known fact, 你好!  ok";
        let segs = segments(text);
        let joined: String = segs.iter().map(|s| s.text).collect();
        assert_eq!(joined, text);

        let kinds: Vec<(&str, SegmentKind)> = segs.iter().map(|s| (s.text, s.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("It's", SegmentKind::Word),
                (" ", SegmentKind::Space),
                ("a", SegmentKind::Word),
                (" ", SegmentKind::Space),
                ("well-known", SegmentKind::Word),
                (" ", SegmentKind::Space),
                ("fact", SegmentKind::Word),
                (",", SegmentKind::Punct),
                (" ", SegmentKind::Space),
                ("你", SegmentKind::Wide),
                ("好", SegmentKind::Wide),
                ("!", SegmentKind::Punct),
                ("  ", SegmentKind::Space),
                ("ok", SegmentKind::Word),
            ]
        );
    }

    #[test]
    fn punctuation_is_one_char_per_segment() {
        let segs = segments("?!.");
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.kind == SegmentKind::Punct));
    }

    #[test]
    fn empty_input_wraps_to_nothing() {
        assert!(wrap(&fonts(), "", 100.0, 12.0).is_empty());
        assert!(wrap(&fonts(), "   \n  ", 100.0, 12.0).is_empty());
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap(&fonts(), "Hello world", 500.0, 12.0);
        assert_eq!(texts(&lines), vec!["Hello world"]);
    }

    #[test]
    fn breaks_at_spaces() {
        let f = fonts();
        let max = measure_width(&f, "Hello world", 12.0) + 1.0;
        let lines = wrap(&f, "Hello world again and again", max, 12.0);
        assert!(lines.len() >= 2);
        assert_eq!(lines[0].text(), "Hello world");
        for line in &lines {
            assert!(!line.text().starts_with(' '));
            assert!(!line.text().ends_with(' '));
        }
    }

    #[test]
    fn cjk_breaks_between_characters() {
        // 5 ideographs at 10pt = 50pt; room for 3 per line
        let lines = wrap(&fonts(), "一二三四五", 30.0, 10.0);
        assert_eq!(texts(&lines), vec!["一二三", "四五"]);
    }

    #[test]
    fn oversize_word_gets_its_own_line() {
        let f = fonts();
        let lines = wrap(&f, "a supercalifragilistic b", 30.0, 12.0);
        assert_eq!(texts(&lines), vec!["a", "supercalifragilistic", "b"]);
        assert!(lines[1].width > 30.0);
    }

    #[test]
    fn whitespace_is_normalized() {
        let lines = wrap(&fonts(), "  a \n\t b   c  ", 500.0, 12.0);
        assert_eq!(texts(&lines), vec!["a b c"]);
    }

    #[test]
    fn mixed_line_keeps_script_runs() {
        let lines = wrap(&fonts(), "Chapter 第一章 begins", 500.0, 12.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].runs,
            vec![
                ScriptRun::new("Chapter ", Script::Narrow),
                ScriptRun::new("第一章", Script::Wide),
                ScriptRun::new(" begins", Script::Narrow),
            ]
        );
    }

    #[test]
    fn width_invariant_holds() {
        let f = fonts();
        let text = "The quick brown fox jumps over the lazy dog. 敏捷的棕色狐狸跳过了懒狗。\
                    Pack my box with five dozen liquor jugs, 然后继续写下去直到换行为止。";
        for max in [40.0, 75.0, 120.0, 200.0] {
            for line in wrap(&f, text, max, 11.0) {
                let measured = measure_width(&f, &line.text(), 11.0);
                let single = segments(&line.text()).len() == 1;
                assert!(
                    measured <= max + 1e-9 || single,
                    "line '{}' is {} wide, max {}",
                    line.text(),
                    measured,
                    max
                );
                assert!((measured - line.width).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn no_content_loss() {
        let f = fonts();
        let text = "Lorem ipsum  dolor sit amet,\nconsectetur 中文混排测试 adipiscing elit.";
        let lines = wrap(&f, text, 60.0, 12.0);
        let rejoined: String = lines.iter().map(|l| l.text()).collect::<Vec<_>>().join(" ");
        let strip = |s: &str| s.split_whitespace().collect::<String>();
        assert_eq!(strip(&rejoined), strip(text));
        for line in &lines {
            assert!(!line.text().contains("  "));
        }
    }

    #[test]
    fn rewrapping_a_fitting_line_is_identity() {
        let f = fonts();
        let text = "One two three four five six seven eight nine ten 一二三四五六七八九十";
        for line in wrap(&f, text, 90.0, 12.0) {
            if line.width <= 90.0 {
                let again = wrap(&f, &line.text(), 90.0, 12.0);
                assert_eq!(again.len(), 1);
                assert_eq!(again[0].text(), line.text());
            }
        }
    }
}
