//! Citation validation against the served prompt context.
//!
//! The last line of defense against a generative model inventing sources:
//! a citation only survives if its quoted text actually appears in a chunk
//! that was placed in the prompt. Matching is case-insensitive with
//! collapsed whitespace, and the whole pass is deterministic for a given
//! answer and chunk set — the first matching chunk in candidate order
//! wins.

use std::collections::HashSet;

use crate::models::{Citation, SearchResult};

/// Minimum length (in normalized characters) for a quoted span to count
/// as a citation candidate. Shorter quotes are almost always emphasis or
/// scare quotes, not source references.
pub const MIN_CITATION_CHARS: usize = 12;

/// Extract citations from `answer` and keep only those whose quoted text
/// appears in one of the served `context` chunks.
///
/// Unmatched quotes are dropped silently: a citation the model fabricated
/// must never reach the caller. Matched citations carry the owning
/// chunk's document path and title (empty strings when the result was not
/// enriched).
pub fn validate_citations(answer: &str, context: &[SearchResult]) -> Vec<Citation> {
    if answer.is_empty() || context.is_empty() {
        return Vec::new();
    }

    let normalized_chunks: Vec<(String, &SearchResult)> = context
        .iter()
        .map(|r| (normalize_text(&r.content), r))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut citations = Vec::new();

    for span in quoted_spans(answer) {
        let needle = normalize_text(span);
        if needle.chars().count() < MIN_CITATION_CHARS {
            continue;
        }
        if !seen.insert(needle.clone()) {
            continue;
        }
        if let Some((_, source)) = normalized_chunks
            .iter()
            .find(|(haystack, _)| haystack.contains(&needle))
        {
            citations.push(Citation {
                text: span.trim().to_string(),
                document_path: source.document_file_path.clone().unwrap_or_default(),
                document_title: source.document_title.clone().unwrap_or_default(),
                chunk_id: Some(source.chunk_id.clone()),
            });
        }
    }

    citations
}

/// Lowercase and collapse all whitespace runs to single spaces.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// All spans enclosed in straight or curly double quotes, in order of
/// appearance.
fn quoted_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut i = 0;

    while let Some(open_rel) = text[i..].find(&['"', '\u{201C}'][..]) {
        let open = i + open_rel;
        let open_ch = match text[open..].chars().next() {
            Some(c) => c,
            None => break,
        };
        let start = open + open_ch.len_utf8();
        let close_ch = if open_ch == '\u{201C}' { '\u{201D}' } else { '"' };

        match text[start..].find(close_ch) {
            Some(close_rel) => {
                let close = start + close_rel;
                spans.push(&text[start..close]);
                i = close + close_ch.len_utf8();
            }
            None => break,
        }
    }

    spans
}
