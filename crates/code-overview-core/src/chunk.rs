//! Overlapping fixed-window text chunker.
//!
//! Splits file text into [`TextChunk`]s of at most `chunk_size` characters,
//! with consecutive windows sharing `chunk_overlap` characters so meaning
//! that straddles a boundary is visible to both sides.
//!
//! # Algorithm
//!
//! 1. Windows start at `0, step, 2·step, …` where `step = size − overlap`.
//! 2. Each window covers `[start, min(start + size, L))`.
//! 3. The last window is the first one reaching the end of the text.
//!
//! The window count for a text of `L` characters is therefore
//! `ceil(max(L − overlap, 0) / step)`, with a minimum of one window for any
//! non-empty text. Empty text yields no windows.
//!
//! Lengths are counted in Unicode scalar values, so windows never split a
//! character.
//!
//! # Example
//!
//! ```rust
//! use code_overview_core::chunk::split_text;
//!
//! let text = "x".repeat(2200);
//! let chunks = split_text(&text, 1000, 200).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].start, 800);
//! ```

use sha2::{Digest, Sha256};

use crate::error::{OverviewError, Result};

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// One window of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this window, starting at 0.
    pub index: usize,
    /// Character offset of the first character (inclusive).
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    pub text: String,
}

/// Number of windows [`split_text`] produces for `len` characters.
pub fn chunk_count(len: usize, chunk_size: usize, chunk_overlap: usize) -> Result<usize> {
    let step = window_step(chunk_size, chunk_overlap)?;
    if len == 0 {
        return Ok(0);
    }
    let span = len.saturating_sub(chunk_overlap);
    Ok(span.div_ceil(step).max(1))
}

fn window_step(chunk_size: usize, chunk_overlap: usize) -> Result<usize> {
    if chunk_size == 0 {
        return Err(OverviewError::configuration("chunk_size must be > 0"));
    }
    if chunk_overlap >= chunk_size {
        return Err(OverviewError::configuration(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(chunk_size - chunk_overlap)
}

/// Split text into overlapping windows.
///
/// # Errors
///
/// Returns a configuration error when `chunk_size` is zero or
/// `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<TextChunk>> {
    let step = window_step(chunk_size, chunk_overlap)?;

    // Byte offset of every char, plus the end of the string, so windows
    // can be sliced on char boundaries.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let len = offsets.len();
    offsets.push(text.len());

    let count = chunk_count(len, chunk_size, chunk_overlap)?;
    let mut chunks = Vec::with_capacity(count);

    for index in 0..count {
        let start = index * step;
        let end = (start + chunk_size).min(len);
        chunks.push(TextChunk {
            index,
            start,
            end,
            text: text[offsets[start]..offsets[end]].to_string(),
        });
    }

    Ok(chunks)
}

/// SHA-256 of a text, hex encoded.
///
/// Stores use it to detect unchanged content and skip re-embedding.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
