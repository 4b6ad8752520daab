//! # Text Layout
//!
//! Script classification, text measurement, and line wrapping.
//!
//! Every width here comes from the caller's `FontContext`: a string is split
//! into wide and narrow runs and each run is measured with its own face.

pub mod script;
pub mod wrap;

pub use script::{classify, Script, ScriptRun};
pub use wrap::{segments, wrap, Segment, SegmentKind, WrappedLine};

use log::debug;

use crate::font::{FontContext, FontMetrics};

/// Width of a mixed-script string in points.
pub fn measure_width(fonts: &FontContext, text: &str, font_size: f64) -> f64 {
    classify(text)
        .iter()
        .map(|run| measure_run(fonts, run, font_size))
        .sum()
}

/// Width of a single-script run in points.
///
/// When the face cannot answer for a glyph, that glyph is measured as the
/// script's placeholder so the run still gets a usable width.
pub fn measure_run(fonts: &FontContext, run: &ScriptRun, font_size: f64) -> f64 {
    let font = fonts.font(run.script);
    match font.advance_width(&run.text, font_size) {
        Ok(width) => width,
        Err(e) => {
            debug!("{}; measuring unknown glyphs as placeholders", e);
            let placeholder = fonts.placeholder_width(run.script, font_size);
            run.text
                .chars()
                .map(|ch| font.char_width(ch, font_size).unwrap_or(placeholder))
                .sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_width_is_sum_of_runs() {
        let fonts = FontContext::new();
        let latin = measure_width(&fonts, "Hello ", 12.0);
        let cjk = measure_width(&fonts, "你好", 12.0);
        let mixed = measure_width(&fonts, "Hello 你好", 12.0);
        assert!((mixed - (latin + cjk)).abs() < 1e-9);
        assert!((cjk - 24.0).abs() < 1e-9);
    }

    #[test]
    fn empty_string_is_zero_width() {
        assert_eq!(measure_width(&FontContext::new(), "", 12.0), 0.0);
    }

    #[test]
    fn unknown_glyph_measures_as_placeholder() {
        let fonts = FontContext::new();
        let omega = measure_width(&fonts, "aΩ", 12.0);
        let question = measure_width(&fonts, "a?", 12.0);
        assert!((omega - question).abs() < 1e-9);
    }
}
