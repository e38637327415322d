//! Structured parse results returned by the layout-parsing service.
//!
//! The provider's JSON is loosely shaped: any field of a segment may be
//! missing, null, or of an unexpected type. All defaults are applied here,
//! once, so the chunker only ever sees fully populated records.

pub mod chunker;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Segment type recorded when the provider omits one.
pub const UNKNOWN_SEGMENT_TYPE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Parse result must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("`chunks` must be an array, got {0}")]
    ChunksNotArray(&'static str),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One OCR line/word group detected inside a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrItem {
    pub text: String,
}

/// The smallest structural unit of a parsed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Layout label such as "Title" or "Text".
    pub segment_type: String,
    /// 1-based page, `None` when the provider did not report a usable value.
    pub page_number: Option<u32>,
    pub ocr: Vec<OcrItem>,
    pub content: String,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            segment_type: UNKNOWN_SEGMENT_TYPE.to_string(),
            page_number: None,
            ocr: Vec::new(),
            content: String::new(),
        }
    }
}

impl Segment {
    /// Segment text: OCR item texts joined with a space when OCR items are
    /// present, otherwise the flat `content`. Always trimmed.
    pub fn text(&self) -> String {
        if self.ocr.is_empty() {
            return self.content.trim().to_string();
        }
        self.ocr
            .iter()
            .map(|item| item.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    pub fn ocr_count(&self) -> usize {
        self.ocr.len()
    }

    fn from_value(value: &Value) -> Self {
        let mut segment = Segment::default();
        let Some(obj) = value.as_object() else {
            return segment;
        };

        if let Some(t) = obj.get("segment_type").and_then(Value::as_str) {
            if !t.trim().is_empty() {
                segment.segment_type = t.to_string();
            }
        }
        segment.page_number = obj.get("page_number").and_then(page_from_value);
        segment.ocr = obj
            .get("ocr")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| OcrItem {
                        text: item
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        segment.content = obj
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        segment
    }
}

/// Page numbers arrive as integers, floats, strings, or a negative sentinel.
fn page_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A top-level structural unit of the parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedChunk {
    pub segments: Vec<Segment>,
}

impl ParsedChunk {
    fn from_value(value: &Value) -> Self {
        let segments = value
            .get("segments")
            .and_then(Value::as_array)
            .map(|segs| segs.iter().map(Segment::from_value).collect())
            .unwrap_or_default();
        Self { segments }
    }
}

/// The result of one parse job, read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub job_id: Option<String>,
    pub status: Option<String>,
    pub chunks: Vec<ParsedChunk>,
}

impl ParsedDocument {
    /// Validate and normalize a raw parse result.
    ///
    /// Only the top-level shape is enforced. A missing `chunks` key yields an
    /// empty document; malformed chunks and segments degrade to defaults.
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ParseError::NotAnObject(json_kind(value)))?;

        let chunks = match obj.get("chunks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(ParsedChunk::from_value).collect(),
            Some(other) => return Err(ParseError::ChunksNotArray(json_kind(other))),
        };

        Ok(Self {
            job_id: obj.get("job_id").and_then(Value::as_str).map(String::from),
            status: obj.get("status").and_then(Value::as_str).map(String::from),
            chunks,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
