//! PDF parse-result ingestion for the Moss semantic-search index.
//!
//! Submits documents to the layout-parsing API, aggregates the returned
//! segments into token-bounded overlapping documents with metadata, and
//! writes them out for indexing.

pub mod document;
pub mod keywords;
pub mod pipeline;
pub mod unsiloed;

pub use document::chunker::{aggregate, count_tokens, split_overlapping, ChunkConfig};
pub use document::ParsedDocument;
pub use keywords::{KeywordExtractor, YakeExtractor};
pub use pipeline::{IngestOutput, IngestPipeline, PipelineError, RunSummary};
pub use unsiloed::ParseJobClient;
