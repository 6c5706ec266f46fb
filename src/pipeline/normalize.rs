//! Label normalization: source labels → deterministic snake_case keys.
//!
//! Source labels arrive as Spanish-language table headings with accents,
//! colons, parentheses and inconsistent whitespace ("Régimen Fiscal:",
//! "Fecha de inicio de operaciones"). Downstream consumers key on these
//! strings, so every variation must collapse to one canonical ASCII form.
//!
//! The transformation is idempotent: feeding an already-normalized key back
//! through produces the same key, which lets callers normalize defensively
//! without tracking whether a string has been processed.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip diacritical marks by NFKD-decomposing and dropping combining marks.
///
/// "Régimen" → "Regimen", "Situación" → "Situacion". Characters that do not
/// decompose (ñ decomposes to n + combining tilde under NFKD, so it is
/// covered too) pass through unchanged.
fn strip_accents(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalize a raw label into a snake_case ASCII key.
///
/// Rule order matters and mirrors the source-site conventions:
/// 1. newlines and underscores become spaces (labels wrap inside cells)
/// 2. trim and lowercase
/// 3. strip accents
/// 4. drop parentheses and colons, hyphens become spaces
/// 5. collapse whitespace runs and join the tokens with underscores
///
/// A label consisting only of punctuation normalizes to the empty string;
/// the extractor drops such fields entirely.
pub fn normalize_label(text: &str) -> String {
    let text = text.replace(['\n', '_'], " ");
    let text = text.trim().to_lowercase();
    let text = strip_accents(&text);
    let text = text
        .replace(['(', ')', ':'], "")
        .replace('-', " ");
    text.split_whitespace().collect::<Vec<_>>().join("_")
}
