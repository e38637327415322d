//! Chunk configuration and id assignment.

use moss_core::format_doc_id;
use thiserror::Error;

/// Segments whose trimmed text is shorter than this are treated as noise.
pub const MIN_SEGMENT_CHARS: usize = 10;

// ── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkConfigError {
    #[error("max_tokens must be greater than zero")]
    ZeroMaxTokens,
}

/// Configuration for chunk aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Token budget per document; larger chunks are split (default: 100).
    pub max_tokens: usize,
    /// Words shared between consecutive sub-chunks (default: 25).
    pub overlap_tokens: usize,
}

impl ChunkConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self, ChunkConfigError> {
        if max_tokens == 0 {
            return Err(ChunkConfigError::ZeroMaxTokens);
        }
        if overlap_tokens >= max_tokens {
            tracing::warn!(
                max_tokens,
                overlap_tokens,
                "overlap is not smaller than the window; windows will advance one word at a time"
            );
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            overlap_tokens: 25,
        }
    }
}

impl TryFrom<&moss_core::config::ChunkingConfig> for ChunkConfig {
    type Error = ChunkConfigError;

    fn try_from(cfg: &moss_core::config::ChunkingConfig) -> Result<Self, Self::Error> {
        Self::new(cfg.max_tokens_per_chunk, cfg.overlap_tokens)
    }
}

// ── Ids ─────────────────────────────────────────────────────────────────────

/// Monotonic id source owned by a single aggregation run.
#[derive(Debug, Clone)]
pub struct DocIdCounter {
    next: u64,
}

impl Default for DocIdCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl DocIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first` (e.g. to continue a previous run).
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> String {
        let id = format_doc_id(self.next);
        self.next += 1;
        id
    }

    /// The value the next call to `next_id` will use.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
