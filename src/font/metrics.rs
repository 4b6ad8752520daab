//! Built-in glyph widths for the fonts that need no embedding.
//!
//! Widths are in 1/1000 em, taken from the Adobe Core14 AFM files and keyed
//! by WinAnsiEncoding byte, since that is the only repertoire a Type1
//! standard font can show.

/// Helvetica widths for WinAnsi 0x20..=0x7E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

/// Helvetica width for a WinAnsi byte outside the ASCII block.
fn helvetica_high(byte: u8) -> u16 {
    match byte {
        0x80 => 556,               // Euro
        0x82 | 0x91 | 0x92 => 222, // single quotes
        0x84 | 0x93 | 0x94 => 333, // double quotes
        0x85 | 0x89 | 0x97 => 1000,
        0x95 => 350, // bullet
        0x96 => 556, // en dash
        0x8B | 0x9B => 333,
        0x8C => 1000,
        0x9C => 944,
        0xA0 => 278,
        0xA1 | 0xA6 => 333,
        0xA9 | 0xAE => 737,
        0xB0 => 400,
        0xB1 | 0xD7 | 0xF7 => 584,
        0xBC..=0xBE => 834,
        0xC6 => 1000,
        0xE6 => 889,
        0xC0..=0xC5 | 0xC8..=0xCB => 667,
        0xC7 | 0xD0 | 0xD1 | 0xD9..=0xDC => 722,
        0xD2..=0xD6 | 0xD8 => 778,
        0xCC..=0xCF | 0xEC..=0xEF => 278,
        0xDF => 611,
        _ => 556,
    }
}

/// Width in 1/1000 em of a WinAnsi byte in Helvetica.
pub(crate) fn helvetica_width(byte: u8) -> u16 {
    match byte {
        0x20..=0x7E => HELVETICA_ASCII[(byte - 0x20) as usize],
        _ => helvetica_high(byte),
    }
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
pub(crate) fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}
