//! Token-budgeted chunk aggregation for parsed documents.
//!
//! Each parsed chunk's segment texts are concatenated, split into
//! overlapping word windows when the concatenation exceeds the token
//! budget, and emitted as uniquely identified documents with provenance
//! metadata ready for the search index.

mod aggregate;
mod helpers;
mod types;

pub use aggregate::{aggregate, aggregate_with_ids};
pub use helpers::{count_tokens, split_overlapping};
pub use types::{ChunkConfig, ChunkConfigError, DocIdCounter, MIN_SEGMENT_CHARS};
