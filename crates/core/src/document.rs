use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Metadata attached to an indexed document. Keys keep insertion order so the
/// serialized payload reads the same way every run.
pub type DocMetadata = IndexMap<String, String>;

/// Prefix for generated document ids (`doc-1`, `doc-2`, ...).
pub const DOC_ID_PREFIX: &str = "doc";

/// Well-known metadata keys written by the chunk aggregator.
pub mod meta_keys {
    pub const SOURCE_CHUNK_INDEX: &str = "source_chunk_index";
    pub const SEGMENTS_COUNT: &str = "segments_count";
    pub const SEGMENT_TYPES: &str = "segment_types";
    pub const PAGE_NUMBER: &str = "page_number";
    pub const OCR_ITEMS_COUNT: &str = "ocr_items_count";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const TOKEN_COUNT: &str = "token_count";
    pub const KEYWORDS: &str = "keywords";
}

/// A unit of text handed to the semantic-search index.
///
/// Serializes as `{"id", "text", "metadata"}`, which is the document-creation
/// payload the index service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: DocMetadata,
}

impl OutputDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: DocMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Look up a metadata value by key.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Empty placeholders are kept in the formatted output but cannot be
    /// indexed: the service rejects documents without an id or text.
    pub fn is_indexable(&self) -> bool {
        !self.id.is_empty() && !self.text.is_empty()
    }
}

/// Format a numeric counter value as a document id.
pub fn format_doc_id(n: u64) -> String {
    format!("{DOC_ID_PREFIX}-{n}")
}
