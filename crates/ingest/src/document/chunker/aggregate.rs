//! Per-chunk segment aggregation into index documents.

use std::collections::BTreeSet;

use moss_core::{meta_keys, DocMetadata, OutputDocument};
use tracing::{debug, info, warn};

use super::helpers::{count_tokens, split_overlapping};
use super::types::{ChunkConfig, DocIdCounter, MIN_SEGMENT_CHARS};
use crate::document::{ParsedChunk, ParsedDocument};
use crate::keywords::KeywordExtractor;

/// Marker recorded as the segment type of an empty placeholder.
const EMPTY_SEGMENT_TYPE: &str = "Empty";
/// Page range recorded when no segment reported a page.
const UNKNOWN_PAGES: &str = "Unknown";

/// Aggregate every chunk of `doc` into index documents, numbering ids from 1.
pub fn aggregate(
    doc: &ParsedDocument,
    config: &ChunkConfig,
    keywords: &dyn KeywordExtractor,
) -> Vec<OutputDocument> {
    aggregate_with_ids(doc, config, keywords, &mut DocIdCounter::new())
}

/// Aggregate using a caller-owned id counter, so several documents can share
/// one id space without colliding.
pub fn aggregate_with_ids(
    doc: &ParsedDocument,
    config: &ChunkConfig,
    keywords: &dyn KeywordExtractor,
    ids: &mut DocIdCounter,
) -> Vec<OutputDocument> {
    if doc.chunks.is_empty() {
        warn!("parse result contains no chunks");
        return Vec::new();
    }

    info!(chunks = doc.chunks.len(), "aggregating parsed chunks");

    let mut out = Vec::new();
    for (idx, chunk) in doc.chunks.iter().enumerate() {
        let source_index = idx + 1;
        match collect_segments(chunk) {
            Some(collected) => {
                out.extend(build_documents(&collected, source_index, config, keywords, ids));
            }
            None => {
                debug!(chunk = source_index, "no usable segments, emitting placeholder");
                out.push(empty_placeholder(source_index, ids.next_id()));
            }
        }
    }

    info!(
        chunks = doc.chunks.len(),
        documents = out.len(),
        "aggregation complete"
    );
    out
}

// ── Segment collection ──────────────────────────────────────────────────────

/// Kept segment texts plus the provenance gathered while collecting them.
#[derive(Debug)]
struct CollectedChunk {
    texts: Vec<String>,
    ocr_items: usize,
    segment_types: BTreeSet<String>,
    pages: BTreeSet<u32>,
}

impl CollectedChunk {
    fn page_range(&self) -> String {
        match (self.pages.first(), self.pages.last()) {
            (Some(min), Some(max)) => format!("{min}-{max}"),
            _ => UNKNOWN_PAGES.to_string(),
        }
    }

    fn segment_types(&self) -> String {
        self.segment_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn collect_segments(chunk: &ParsedChunk) -> Option<CollectedChunk> {
    let mut collected = CollectedChunk {
        texts: Vec::new(),
        ocr_items: 0,
        segment_types: BTreeSet::new(),
        pages: BTreeSet::new(),
    };

    for segment in &chunk.segments {
        let text = segment.text();
        if text.chars().count() < MIN_SEGMENT_CHARS {
            continue;
        }
        collected.texts.push(text);
        collected.ocr_items += segment.ocr_count();
        collected.segment_types.insert(segment.segment_type.clone());
        if let Some(page) = segment.page_number {
            collected.pages.insert(page);
        }
    }

    (!collected.texts.is_empty()).then_some(collected)
}

// ── Document assembly ───────────────────────────────────────────────────────

fn build_documents(
    collected: &CollectedChunk,
    source_index: usize,
    config: &ChunkConfig,
    keywords: &dyn KeywordExtractor,
    ids: &mut DocIdCounter,
) -> Vec<OutputDocument> {
    let joined = collected.texts.join(" ");
    let token_count = count_tokens(&joined);

    // The budget is checked in tokens but windows are cut in words.
    let pieces = if token_count <= config.max_tokens {
        vec![joined]
    } else {
        split_overlapping(&joined, config.max_tokens, config.overlap_tokens)
    };

    debug!(
        chunk = source_index,
        segments = collected.texts.len(),
        ocr_items = collected.ocr_items,
        tokens = token_count,
        sub_chunks = pieces.len(),
        "chunk collected"
    );

    let page_range = collected.page_range();
    let segment_types = collected.segment_types();
    let total = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let id = ids.next_id();
            let mut metadata = DocMetadata::new();
            metadata.insert(meta_keys::SOURCE_CHUNK_INDEX.into(), source_index.to_string());
            metadata.insert(meta_keys::SEGMENTS_COUNT.into(), collected.texts.len().to_string());
            metadata.insert(meta_keys::SEGMENT_TYPES.into(), segment_types.clone());
            metadata.insert(meta_keys::PAGE_NUMBER.into(), page_range.clone());
            metadata.insert(meta_keys::OCR_ITEMS_COUNT.into(), collected.ocr_items.to_string());
            metadata.insert(meta_keys::CHUNK_INDEX.into(), (i + 1).to_string());
            metadata.insert(meta_keys::TOTAL_CHUNKS.into(), total.to_string());
            metadata.insert(meta_keys::TOKEN_COUNT.into(), count_tokens(&text).to_string());
            metadata.insert(meta_keys::KEYWORDS.into(), keywords.extract(&text).join(", "));
            OutputDocument::new(id, text, metadata)
        })
        .collect()
}

fn empty_placeholder(source_index: usize, id: String) -> OutputDocument {
    let mut metadata = DocMetadata::new();
    metadata.insert(meta_keys::SOURCE_CHUNK_INDEX.into(), source_index.to_string());
    metadata.insert(meta_keys::SEGMENTS_COUNT.into(), "0".into());
    metadata.insert(meta_keys::SEGMENT_TYPES.into(), EMPTY_SEGMENT_TYPE.into());
    metadata.insert(meta_keys::PAGE_NUMBER.into(), UNKNOWN_PAGES.into());
    metadata.insert(meta_keys::OCR_ITEMS_COUNT.into(), "0".into());
    metadata.insert(meta_keys::CHUNK_INDEX.into(), "1".into());
    metadata.insert(meta_keys::TOTAL_CHUNKS.into(), "1".into());
    metadata.insert(meta_keys::TOKEN_COUNT.into(), "0".into());
    metadata.insert(meta_keys::KEYWORDS.into(), String::new());
    OutputDocument::new(id, String::new(), metadata)
}
