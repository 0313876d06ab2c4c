//! Text cleaning applied to every extracted document segment.
//!
//! Extractors leave layout debris behind (control bytes, runs of spaces from
//! column alignment, stacks of blank lines). Cleaning keeps paragraph breaks
//! and drops the rest so chunk windows carry text, not padding.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

static CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\u{FEFF}\u{FFFD}]").expect("literal regex")
});
static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}\u{3000}]+").expect("literal regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m) +$").expect("literal regex"));
static LEADING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ +").expect("literal regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("literal regex"));

/// Cleans extracted text.
///
/// - Normalizes line endings to `\n`.
/// - Removes control characters (tabs and newlines excepted), BOMs and
///   replacement characters.
/// - Collapses runs of spaces/tabs into one space and trims each line.
/// - Collapses more than one blank line into a single blank line.
pub fn clean_text(s: &str) -> String {
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = CONTROL.replace_all(&s, "");
    let s = INLINE_SPACE.replace_all(&s, " ");
    let s = TRAILING_SPACE.replace_all(&s, "");
    let s = LEADING_SPACE.replace_all(&s, "");
    let s = BLANK_LINES.replace_all(&s, "\n\n");
    let out = s.trim().to_string();
    trace!(out_len = out.len(), "clean_text");
    out
}
