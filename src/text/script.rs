//! Wide/narrow script classification.
//!
//! A character is wide when it is a Han ideograph, CJK symbol or
//! punctuation, or a halfwidth/fullwidth form. Everything else is narrow
//! and measured with the western face.

use unicode_script::UnicodeScript;

/// Script class of a run, driving which face measures and draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Wide,
    Narrow,
}

impl Script {
    /// Classify a single character.
    pub fn of(ch: char) -> Script {
        match ch as u32 {
            // CJK Symbols and Punctuation
            0x3000..=0x303F => Script::Wide,
            // Halfwidth and Fullwidth Forms
            0xFF00..=0xFFEF => Script::Wide,
            _ if ch.script() == unicode_script::Script::Han => Script::Wide,
            _ => Script::Narrow,
        }
    }
}

/// A maximal run of characters sharing a script class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRun {
    pub text: String,
    pub script: Script,
}

impl ScriptRun {
    pub fn new(text: impl Into<String>, script: Script) -> Self {
        Self {
            text: text.into(),
            script,
        }
    }
}

/// Split `text` into maximal same-class runs, in order.
///
/// Empty input yields no runs.
pub fn classify(text: &str) -> Vec<ScriptRun> {
    let mut runs: Vec<ScriptRun> = Vec::new();
    for ch in text.chars() {
        let script = Script::of(ch);
        match runs.last_mut() {
            Some(run) if run.script == script => run.text.push(ch),
            _ => runs.push(ScriptRun {
                text: ch.to_string(),
                script,
            }),
        }
    }
    runs
}
