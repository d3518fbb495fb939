//! Post-processing: deterministic cleanup of text reported by the PDF engine.
//!
//! pdfium hands back text objects exactly as the content stream encodes
//! them, which sometimes means embedded line breaks, BOMs, soft hyphens or
//! zero-width joiners. None of these survive Markdown rendering well, so each
//! span's text goes through a few cheap rules before it enters the layout.
//! The formatter itself never rewrites span text.
//!
//! ## Rule Order
//!
//! Line breaks are folded into spaces before runs of blanks are collapsed,
//! so a `"foo\r\n bar"` ends up as `"foo bar"`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one span's text.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 2. Replace line breaks and tabs with a space
/// 3. Collapse runs of spaces created by rule 2 into one
///
/// Leading and trailing whitespace is kept: it separates words across span
/// boundaries.
pub fn clean_span_text(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = fold_line_breaks(&s);
    collapse_folded_spaces(&s)
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{0000}',
        ],
        "",
    )
}

// ── Rule 2: Fold line breaks and tabs ───────────────────────────────────────

static RE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|[\r\n\t\x{2028}\x{2029}]").unwrap());

fn fold_line_breaks(input: &str) -> String {
    RE_BREAKS.replace_all(input, " ").to_string()
}

// ── Rule 3: Collapse repeated spaces ────────────────────────────────────────

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

fn collapse_folded_spaces(input: &str) -> String {
    RE_SPACES.replace_all(input, " ").to_string()
}
