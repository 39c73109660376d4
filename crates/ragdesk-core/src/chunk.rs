//! Overlapping sliding-window text chunker.
//!
//! Splits extracted document text into [`TextSegment`]s of at most
//! `chunk_size` characters. Consecutive segments share exactly `overlap`
//! characters so that retrieval never loses context at a cut.
//!
//! # Algorithm
//!
//! 1. Empty text yields no segments.
//! 2. If the rest of the text fits in one window, emit it and stop.
//! 3. Otherwise look at the window `[start, start + chunk_size)` and end the
//!    segment just after the last separator in it, as long as that end lies
//!    past `start + overlap`. Failing that, hard-split at the window edge.
//! 4. The next window starts `overlap` characters before the previous end.
//!
//! Lengths are measured in `char`s, never bytes, so multi-byte text is never
//! cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use ragdesk_core::chunk::{chunk_text, reconstruct, ChunkingOptions};
//!
//! let text = "a".repeat(3000);
//! let segments = chunk_text(&text, &ChunkingOptions::default());
//! assert_eq!(segments.len(), 4);
//! assert_eq!(reconstruct(&segments), text);
//! ```

use sha2::{Digest, Sha256};

use crate::models::TextSegment;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Window size, overlap and preferred cut point for [`chunk_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Preferred cut point; an empty separator disables boundary snapping.
    pub separator: String,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Split `text` into overlapping segments with contiguous indices from 0.
///
/// An overlap that is not smaller than the chunk size is clamped to
/// `chunk_size - 1`; configuration validation rejects such values before
/// they reach here.
pub fn chunk_text(text: &str, opts: &ChunkingOptions) -> Vec<TextSegment> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = opts.chunk_size.max(1);
    let overlap = opts.overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut shared = 0usize;

    loop {
        if total - start <= chunk_size {
            segments.push(make_segment(segments.len(), &text[bounds[start]..], shared));
            break;
        }

        let limit = start + chunk_size;
        let end = separator_end(text, &bounds, start, limit, &opts.separator)
            .filter(|&end| end > start + overlap)
            .unwrap_or(limit);

        segments.push(make_segment(
            segments.len(),
            &text[bounds[start]..bounds[end]],
            shared,
        ));

        start = end - overlap;
        shared = overlap;
    }

    segments
}

/// Rebuild the original text by dropping each segment's shared prefix.
pub fn reconstruct(segments: &[TextSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.extend(seg.text.chars().skip(seg.overlap));
    }
    out
}

/// Char index just past the last separator inside `[start, limit)`.
fn separator_end(
    text: &str,
    bounds: &[usize],
    start: usize,
    limit: usize,
    separator: &str,
) -> Option<usize> {
    if separator.is_empty() {
        return None;
    }
    let window = &text[bounds[start]..bounds[limit]];
    let pos = window.rfind(separator)?;
    let end_byte = bounds[start] + pos + separator.len();
    bounds.binary_search(&end_byte).ok()
}

fn make_segment(index: usize, text: &str, overlap: usize) -> TextSegment {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    TextSegment {
        index,
        text: text.to_string(),
        overlap,
        hash,
    }
}
