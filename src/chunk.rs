//! Overlapping, boundary-aware text chunker.
//!
//! Splits document text into [`Chunk`]s sized by an approximate token
//! budget. Each cut prefers the nearest preceding sentence ending inside
//! the scan window, falls back to the nearest word boundary, and accepts a
//! raw character-budget cut only when neither exists. Adjacent chunks
//! overlap by a configurable amount so retrieval does not lose context at
//! chunk seams.
//!
//! # Algorithm
//!
//! 1. Convert the token budgets to character budgets (~4 chars/token).
//! 2. From the cursor, scan forward one character budget, then walk
//!    backward to the nearest sentence ending (`.` `!` `?` `\n`) followed
//!    by whitespace or end-of-text.
//! 3. If none exists in the window, cut after the nearest preceding
//!    whitespace; failing that, accept the raw cut (snapped to a UTF-8
//!    character boundary, never mid code point).
//! 4. Step the cursor back by the overlap budget, then skip forward over
//!    whitespace so the next chunk does not start mid-word. If that fails
//!    to advance the cursor, jump to the previous chunk's end to guarantee
//!    termination.
//!
//! # Guarantees
//!
//! - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
//! - The first chunk starts at offset 0 and the last ends at `text.len()`;
//!   consecutive windows overlap or touch, never leaving a gap.
//! - Chunking is deterministic for a given text and parameter pair.

use tracing::warn;

use crate::error::{Result, RetrievalError};
use crate::models::{chunk_id, Chunk};
use crate::tokens::{estimate_tokens, CHARS_PER_TOKEN};

/// Safety bound on the number of chunks produced for one document.
///
/// Hitting it aborts chunking early with a warning (degraded, not
/// rejected) so pathological input cannot loop unbounded.
pub const MAX_CHUNKS_PER_DOCUMENT: usize = 10_000;

/// Characters that may terminate a sentence for boundary purposes.
const SENTENCE_ENDINGS: [char; 4] = ['.', '!', '?', '\n'];

/// Split `text` into overlapping chunks owned by `document_id`.
///
/// Returns an empty vector for empty text; text shorter than one chunk
/// budget yields exactly one chunk spanning the whole text. Chunks carry
/// byte offsets into `text` and a token estimate, but no embedding — the
/// indexing pipeline fills that in.
///
/// # Errors
///
/// `RetrievalError::Configuration` when `chunk_size_tokens == 0` or
/// `overlap_tokens >= chunk_size_tokens`.
pub fn chunk_text(
    text: &str,
    document_id: &str,
    chunk_size_tokens: usize,
    overlap_tokens: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size_tokens == 0 {
        return Err(RetrievalError::Configuration(
            "chunk_size_tokens must be > 0".to_string(),
        ));
    }
    if overlap_tokens >= chunk_size_tokens {
        return Err(RetrievalError::Configuration(format!(
            "overlap_tokens ({}) must be smaller than chunk_size_tokens ({})",
            overlap_tokens, chunk_size_tokens
        )));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let max_chars = chunk_size_tokens * CHARS_PER_TOKEN;
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;
    let spans = chunk_spans(text, max_chars, overlap_chars, MAX_CHUNKS_PER_DOCUMENT);

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| {
            let content = &text[start..end];
            Chunk {
                id: chunk_id(document_id, i),
                document_id: document_id.to_string(),
                content: content.to_string(),
                start_index: start,
                end_index: end,
                token_count: estimate_tokens(content),
                chunk_index: i,
                embedding: Vec::new(),
            }
        })
        .collect())
}

/// Compute the `[start, end)` byte spans for each chunk.
fn chunk_spans(
    text: &str,
    max_chars: usize,
    overlap_chars: usize,
    max_chunks: usize,
) -> Vec<(usize, usize)> {
    let len = text.len();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;

    while start < len {
        if spans.len() >= max_chunks {
            warn!(
                produced = spans.len(),
                "chunk safety bound reached, aborting chunking early"
            );
            break;
        }

        let window_end = snap_to_char_boundary(text, start.saturating_add(max_chars).min(len));
        let mut end = if window_end >= len {
            len
        } else {
            find_break(text, start, window_end)
        };

        if end <= start {
            // Never emit an empty span: take at least one code point.
            end = next_char_boundary(text, start);
        }

        spans.push((start, end));

        if end >= len {
            break;
        }

        start = advance_cursor(text, start, end, overlap_chars);
    }

    spans
}

/// Pick the cut position inside `[start, window_end)`.
///
/// Nearest preceding sentence ending wins; then nearest preceding
/// whitespace; then the raw window edge.
fn find_break(text: &str, start: usize, window_end: usize) -> usize {
    let window = &text[start..window_end];

    for (i, ch) in window.char_indices().rev() {
        if !SENTENCE_ENDINGS.contains(&ch) {
            continue;
        }
        let after = start + i + ch.len_utf8();
        let followed_ok = match text[after..].chars().next() {
            None => true,
            Some(next) => next.is_whitespace(),
        };
        if followed_ok {
            return after;
        }
    }

    for (i, ch) in window.char_indices().rev() {
        if ch.is_whitespace() {
            return start + i + ch.len_utf8();
        }
    }

    window_end
}

/// Step the cursor back by the overlap, then forward over whitespace.
///
/// The whitespace skip is capped at `end` so consecutive windows overlap
/// or touch but never leave a gap. Jumps to `end` outright when the
/// overlap step would fail to advance past `start`.
fn advance_cursor(text: &str, start: usize, end: usize, overlap_chars: usize) -> usize {
    let mut next = snap_to_char_boundary(text, end.saturating_sub(overlap_chars));

    while next < end {
        match text[next..].chars().next() {
            Some(ch) if ch.is_whitespace() => next += ch.len_utf8(),
            _ => break,
        }
    }

    if next <= start {
        end
    } else {
        next
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The byte index just past the code point starting at `index`.
fn next_char_boundary(text: &str, index: usize) -> usize {
    match text[index..].chars().next() {
        Some(ch) => index + ch.len_utf8(),
        None => text.len(),
    }
}
