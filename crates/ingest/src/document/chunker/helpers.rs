//! Token counting and overlapping window splitting.

use once_cell::sync::Lazy;
use regex::Regex;

/// A run of word characters, or any single non-space punctuation character.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("valid token regex"));

/// Approximate token count: word runs plus individual punctuation marks.
///
/// This is a cheap stand-in for a model tokenizer and does not match any
/// particular one.
pub fn count_tokens(text: &str) -> usize {
    TOKEN_RE.find_iter(text).count()
}

/// Split `text` into windows of at most `max_tokens` whitespace-delimited
/// words, each starting `overlap_tokens` words before the previous window's
/// end.
///
/// Text that already fits is returned unchanged as a single window; empty or
/// whitespace-only text yields no windows. Windows always advance by at least
/// one word, so an overlap as large as the window cannot stall the loop.
pub fn split_overlapping(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // `ChunkConfig::new` rejects zero; keep direct callers from looping forever.
    let max_tokens = max_tokens.max(1);

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_tokens {
        return vec![text.to_string()];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max_tokens).min(words.len());
        windows.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end.saturating_sub(overlap_tokens).max(start + 1);
    }
    windows
}
