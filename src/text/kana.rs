//! Kana normalization
//!
//! The zenz models are trained on katakana readings, so hiragana input is
//! shifted into the katakana block before framing.

/// First code point of the mapped hiragana range (ぁ)
const HIRAGANA_FIRST: char = '\u{3041}';
/// Last code point of the mapped hiragana range (ゖ)
const HIRAGANA_LAST: char = '\u{3096}';
/// Distance between a hiragana code point and its katakana counterpart
const KATAKANA_OFFSET: u32 = 0x60;

/// Maps a single hiragana character to katakana, passing everything else through.
pub fn hiragana_to_katakana(c: char) -> char {
    match c {
        HIRAGANA_FIRST..=HIRAGANA_LAST => char::from_u32(c as u32 + KATAKANA_OFFSET).unwrap_or(c),
        _ => c,
    }
}

/// Converts every hiragana character in `input` to katakana.
///
/// Katakana code points sit outside the mapped range, so the conversion is
/// idempotent.
pub fn to_katakana(input: &str) -> String {
    input.chars().map(hiragana_to_katakana).collect()
}

/// Rewrites text into the form the model saw during training.
///
/// ASCII spaces become ideographic spaces (U+3000) and line breaks are dropped.
pub fn preprocess_for_model(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => out.push('\u{3000}'),
            '\r' | '\n' => {}
            other => out.push(other),
        }
    }
    out
}
