//! Overlapping character windows over loaded segments.
//!
//! Goals:
//! - Every window is at most `max_size` characters (Unicode scalar values).
//! - Consecutive windows of one segment share exactly `overlap` characters.
//! - Reading order is preserved; windows inherit the parent metadata and add
//!   `window` (0-based ordinal) and `start_char` (offset in the parent text).
//! - Windows holding only whitespace are dropped; ordinals stay consecutive.
//!
//! A window prefers to end right after a whitespace character found in its
//! back half, so words are not cut when the text allows it. The next window
//! always starts `overlap` characters before the previous end, which keeps the
//! overlap exact regardless of where the break fell.

use tracing::{debug, trace};

use crate::config::ChunkingConfig;
use crate::errors::RagError;
use crate::record::{Chunk, meta};

/// Splits every chunk into bounded overlapping windows.
///
/// # Errors
/// [`RagError::Config`] if `max_size == 0` or `overlap >= max_size`.
pub fn split(chunks: &[Chunk], max_size: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    ChunkingConfig {
        enabled: true,
        max_size,
        overlap,
    }
    .validate()?;

    let mut out = Vec::with_capacity(chunks.len());
    for parent in chunks {
        for (window, (start, text)) in windows(&parent.text, max_size, overlap)
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .enumerate()
        {
            let mut child = Chunk {
                text,
                metadata: parent.metadata.clone(),
            };
            child
                .metadata
                .insert(meta::WINDOW.into(), serde_json::json!(window));
            child
                .metadata
                .insert(meta::START_CHAR.into(), serde_json::json!(start));
            out.push(child);
        }
    }

    debug!(
        input = chunks.len(),
        output = out.len(),
        max_size,
        overlap,
        "split completed"
    );
    Ok(out)
}

/// Returns `(start_char, text)` windows of one text. Whitespace-only input
/// yields nothing.
fn windows(text: &str, max_size: usize, overlap: usize) -> Vec<(usize, String)> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n <= max_size {
        return vec![(0, text.to_string())];
    }

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max_size).min(n);
        let end = if hard_end == n {
            n
        } else {
            soft_end(&chars, start, hard_end, max_size, overlap)
        };

        out.push((start, chars[start..end].iter().collect()));
        trace!(start, end, "window");
        if end == n {
            break;
        }
        // end > start + overlap, so this always moves forward.
        start = end - overlap;
    }
    out
}

/// Break position in `(start + max(overlap, max_size / 2), hard_end]` right
/// after a whitespace character, or `hard_end` if there is none.
fn soft_end(chars: &[char], start: usize, hard_end: usize, max_size: usize, overlap: usize) -> usize {
    let floor = start + (max_size / 2).max(overlap) + 1;
    (floor..=hard_end)
        .rev()
        .find(|&end| chars[end - 1].is_whitespace())
        .unwrap_or(hard_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    fn suffix(s: &str, n: usize) -> String {
        let c: Vec<char> = s.chars().collect();
        c[c.len() - n..].iter().collect()
    }

    fn prefix(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    #[test]
    fn windows_respect_size_and_exact_overlap() {
        let text = "Kimchi fried rice needs day-old rice, well fermented kimchi, \
                    sesame oil, soy sauce, a pinch of sugar, scallion and a fried egg on top. "
            .repeat(8);
        let parent = Chunk::new(text.clone()).with(meta::SOURCE, "recipes.pdf");
        let out = split(&[parent], 120, 30).unwrap();

        assert!(out.len() > 1);
        for w in &out {
            assert!(char_len(&w.text) <= 120);
            assert_eq!(w.source(), Some("recipes.pdf"));
        }
        for pair in out.windows(2) {
            assert_eq!(suffix(&pair[0].text, 30), prefix(&pair[1].text, 30));
        }
        // Reassembling windows minus overlaps yields the original text.
        let mut rebuilt = out[0].text.clone();
        for w in &out[1..] {
            rebuilt.extend(w.text.chars().skip(30));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn breaks_on_whitespace_when_possible() {
        let text = "aaaa bbbb cccc dddd eeee ffff gggg";
        let out = split(&[Chunk::new(text)], 12, 2).unwrap();
        assert!(out[0].text.ends_with(' '));
        assert_eq!(out[0].metadata[meta::WINDOW], 0);
        assert_eq!(out[1].metadata[meta::START_CHAR], char_len(&out[0].text) - 2);
    }

    #[test]
    fn multibyte_text_is_counted_in_chars() {
        let text = "김치볶음밥".repeat(30);
        let out = split(&[Chunk::new(text)], 40, 10).unwrap();
        assert!(out.iter().all(|c| char_len(&c.text) <= 40));
        for pair in out.windows(2) {
            assert_eq!(suffix(&pair[0].text, 10), prefix(&pair[1].text, 10));
        }
    }

    #[test]
    fn short_text_is_one_window_and_blank_is_dropped() {
        let out = split(&[Chunk::new("egg"), Chunk::new("   ")], 500, 100).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "egg");
    }

    #[test]
    fn whitespace_windows_are_dropped() {
        let out = split(&[Chunk::new("a b\n\n  c")], 1, 0).unwrap();
        let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        let ordinals: Vec<_> = out.iter().map(|c| c.metadata[meta::WINDOW].clone()).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(out[2].metadata[meta::START_CHAR], 7);
    }

    #[test]
    fn invalid_parameters_are_config_errors() {
        assert!(matches!(
            split(&[Chunk::new("x")], 10, 10),
            Err(RagError::Config(_))
        ));
        assert!(matches!(split(&[], 0, 0), Err(RagError::Config(_))));
    }

    #[test]
    fn zero_overlap_tiles_the_text() {
        let text = "x".repeat(25);
        let out = split(&[Chunk::new(text)], 10, 0).unwrap();
        let lens: Vec<usize> = out.iter().map(|c| char_len(&c.text)).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }
}
