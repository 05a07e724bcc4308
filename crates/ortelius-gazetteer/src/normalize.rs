//! Shared text normalization.
//!
//! The engine-side tokenizer and the store-side indexer must normalize
//! bit-for-bit identically, or candidate retrieval silently misses matches.
//! Both therefore call through this module: lower-case, NFKD decomposition,
//! strip combining marks, collapse punctuation and whitespace runs to a
//! single space.

use unicode_normalization::UnicodeNormalization;

/// Whether a character is a combining mark (stripped after NFKD).
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{20D0}'..='\u{20FF}')
}

/// Normalize a raw string for indexing or matching.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            // Punctuation and whitespace both act as token separators.
            pending_space = true;
        }
    }
    out
}

/// Normalize and split into individual tokens.
#[must_use]
pub fn normalize_tokens(raw: &str) -> Vec<String> {
    normalize(raw)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}
