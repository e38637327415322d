//! End-to-end ingestion: parse job → aggregation → JSON outputs.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use moss_core::config::MossConfig;
use moss_core::{meta_keys, OutputDocument};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::document::chunker::{aggregate, ChunkConfig, ChunkConfigError};
use crate::document::{ParseError, ParsedDocument};
use crate::keywords::{KeywordExtractor, YakeExtractor};
use crate::unsiloed::{ParseJobClient, ParseJobError};

/// Where the unformatted parse result is dumped unless told otherwise.
pub const DEFAULT_RAW_JSON_PATH: &str = "raw_parse_results.json";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Job(#[from] ParseJobError),

    #[error("Malformed parse result: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkConfigError),

    #[error("No valid documents to index (all {0} documents lack id or text)")]
    NoIndexableDocuments(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Run output ──────────────────────────────────────────────────────

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub chunks_in: usize,
    pub documents_out: usize,
    pub empty_placeholders: usize,
    /// Source chunks that were cut into more than one window.
    pub split_chunks: usize,
}

impl RunSummary {
    fn from_documents(chunks_in: usize, docs: &[OutputDocument]) -> Self {
        let empty_placeholders = docs.iter().filter(|d| d.text.is_empty()).count();
        let split_chunks = docs
            .iter()
            .filter(|d| d.meta(meta_keys::CHUNK_INDEX) == Some("1"))
            .filter(|d| {
                d.meta(meta_keys::TOTAL_CHUNKS)
                    .and_then(|t| t.parse::<usize>().ok())
                    .is_some_and(|t| t > 1)
            })
            .count();
        Self {
            chunks_in,
            documents_out: docs.len(),
            empty_placeholders,
            split_chunks,
        }
    }

    pub fn log(&self) {
        info!(
            chunks_in = self.chunks_in,
            documents_out = self.documents_out,
            empty_placeholders = self.empty_placeholders,
            split_chunks = self.split_chunks,
            "ingest run summary"
        );
    }
}

#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub documents: Vec<OutputDocument>,
    pub summary: RunSummary,
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Parses a PDF remotely and turns the result into index documents.
pub struct IngestPipeline {
    client: ParseJobClient,
    chunking: ChunkConfig,
    keywords: Box<dyn KeywordExtractor>,
    raw_json_path: Option<PathBuf>,
}

impl IngestPipeline {
    pub fn new(client: ParseJobClient, chunking: ChunkConfig) -> Self {
        Self {
            client,
            chunking,
            keywords: Box::new(YakeExtractor::default()),
            raw_json_path: Some(PathBuf::from(DEFAULT_RAW_JSON_PATH)),
        }
    }

    /// Set (or disable with `None`) the raw parse result dump.
    pub fn with_raw_output(mut self, path: Option<PathBuf>) -> Self {
        self.raw_json_path = path;
        self
    }

    pub fn with_keywords(mut self, keywords: Box<dyn KeywordExtractor>) -> Self {
        self.keywords = keywords;
        self
    }

    pub async fn process_pdf(&self, path: &Path) -> Result<IngestOutput, PipelineError> {
        if !path.is_file() {
            return Err(ParseJobError::InputNotFound(path.to_path_buf()).into());
        }

        let start = Instant::now();
        info!(path = %path.display(), "processing pdf");

        let raw = self.client.parse_file(path).await?;

        if let Some(raw_path) = &self.raw_json_path {
            write_json(raw_path, &raw)?;
            info!(path = %raw_path.display(), "raw parse result saved");
        }

        let output = format_value(&raw, &self.chunking, self.keywords.as_ref())?;
        info!(
            path = %path.display(),
            documents = output.documents.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pdf processed"
        );
        Ok(output)
    }
}

// ── Formatting ──────────────────────────────────────────────────────

/// Aggregate a raw parse result already in memory.
pub fn format_value(
    raw: &Value,
    chunking: &ChunkConfig,
    keywords: &dyn KeywordExtractor,
) -> Result<IngestOutput, PipelineError> {
    let parsed = ParsedDocument::from_value(raw)?;
    let documents = aggregate(&parsed, chunking, keywords);
    let summary = RunSummary::from_documents(parsed.chunks.len(), &documents);
    Ok(IngestOutput { documents, summary })
}

/// Re-aggregate a previously dumped raw parse result without any network access.
pub fn format_file(
    raw_json: &Path,
    chunking: &ChunkConfig,
    keywords: &dyn KeywordExtractor,
) -> Result<IngestOutput, PipelineError> {
    let bytes = std::fs::read(raw_json)?;
    let raw: Value = serde_json::from_slice(&bytes)?;
    info!(path = %raw_json.display(), "formatting saved parse result");
    format_value(&raw, chunking, keywords)
}

/// `<dir>/<stem>_parsed.json` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    input.with_file_name(format!("{stem}_parsed.json"))
}

// ── Writers ─────────────────────────────────────────────────────────

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

/// Write the full formatted document list, placeholders included.
pub fn write_documents(path: &Path, docs: &[OutputDocument]) -> Result<(), PipelineError> {
    write_json(path, docs)?;
    info!(path = %path.display(), documents = docs.len(), "formatted documents saved");
    Ok(())
}

#[derive(Serialize)]
struct IndexManifest<'a> {
    index_name: &'a str,
    model_id: &'a str,
    documents: Vec<&'a OutputDocument>,
}

/// Write the index-creation payload with only the indexable documents.
/// Returns how many documents it contains.
pub fn write_index_manifest(
    path: &Path,
    moss: &MossConfig,
    docs: &[OutputDocument],
) -> Result<usize, PipelineError> {
    let documents: Vec<&OutputDocument> = docs.iter().filter(|d| d.is_indexable()).collect();
    if documents.is_empty() {
        return Err(PipelineError::NoIndexableDocuments(docs.len()));
    }

    let skipped = docs.len() - documents.len();
    if skipped > 0 {
        warn!(skipped, "documents without text left out of the index manifest");
    }

    let count = documents.len();
    write_json(
        path,
        &IndexManifest {
            index_name: &moss.index_name,
            model_id: &moss.model_id,
            documents,
        },
    )?;
    info!(
        path = %path.display(),
        index = %moss.index_name,
        documents = count,
        "index manifest saved"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moss_core::config::UnsiloedConfig;
    use serde_json::json;

    struct NoKeywords;

    impl KeywordExtractor for NoKeywords {
        fn extract(&self, _text: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn moss() -> MossConfig {
        MossConfig {
            project_id: None,
            project_key: None,
            index_name: "test-index".into(),
            model_id: "moss-minilm".into(),
            top_k: 6,
        }
    }

    fn unsiloed(base_url: &str) -> UnsiloedConfig {
        UnsiloedConfig {
            api_key: Some("k".into()),
            base_url: base_url.into(),
            poll_interval_secs: 0,
            max_wait_secs: 5,
            request_timeout_secs: 5,
            segmentation_method: "Smart Layout Detection".into(),
            ocr_mode: "Process All Content".into(),
            ocr_engine: "UnsiloedHawk".into(),
        }
    }

    fn long_text(words: usize) -> String {
        (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn raw_result() -> Value {
        json!({
            "job_id": "job-1",
            "status": "Succeeded",
            "chunks": [
                { "segments": [
                    {
                        "segment_type": "Title",
                        "page_number": 1,
                        "content": "Quarterly results overview"
                    }
                ]},
                { "segments": [
                    { "segment_type": "Text", "page_number": 2, "content": "tiny" }
                ]},
                { "segments": [
                    { "segment_type": "Text", "page_number": 3, "content": long_text(150) }
                ]}
            ]
        })
    }

    #[test]
    fn summary_counts_placeholders_and_splits() {
        let out = format_value(&raw_result(), &ChunkConfig::default(), &NoKeywords).unwrap();

        assert_eq!(
            out.summary,
            RunSummary {
                chunks_in: 3,
                documents_out: 4,
                empty_placeholders: 1,
                split_chunks: 1,
            }
        );
        assert_eq!(out.documents[1].meta(meta_keys::SEGMENT_TYPES), Some("Empty"));
    }

    #[test]
    fn malformed_result_is_parse_error() {
        let err = format_value(&json!({ "chunks": 3 }), &ChunkConfig::default(), &NoKeywords)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn format_file_reads_saved_result() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.json");
        std::fs::write(&raw_path, serde_json::to_vec(&raw_result()).unwrap()).unwrap();

        let out = format_file(&raw_path, &ChunkConfig::default(), &NoKeywords).unwrap();
        assert_eq!(out.documents.len(), 4);
        assert_eq!(out.documents[0].id, "doc-1");

        let missing = format_file(
            &dir.path().join("nope.json"),
            &ChunkConfig::default(),
            &NoKeywords,
        );
        assert!(matches!(missing, Err(PipelineError::Io(_))));
    }

    #[test]
    fn documents_written_as_json_list() {
        let dir = tempfile::tempdir().unwrap();
        let out = format_value(&raw_result(), &ChunkConfig::default(), &NoKeywords).unwrap();
        let path = dir.path().join("doc_parsed.json");

        write_documents(&path, &out.documents).unwrap();

        let back: Vec<OutputDocument> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, out.documents);
    }

    #[test]
    fn manifest_excludes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let out = format_value(&raw_result(), &ChunkConfig::default(), &NoKeywords).unwrap();
        let path = dir.path().join("manifest.json");

        let written = write_index_manifest(&path, &moss(), &out.documents).unwrap();
        assert_eq!(written, 3);

        let manifest: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(manifest["index_name"], "test-index");
        assert_eq!(manifest["model_id"], "moss-minilm");
        let ids: Vec<&str> = manifest["documents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["doc-1", "doc-3", "doc-4"]);
    }

    #[test]
    fn manifest_without_indexable_documents_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = format_value(
            &json!({ "chunks": [{ "segments": [] }] }),
            &ChunkConfig::default(),
            &NoKeywords,
        )
        .unwrap();
        let path = dir.path().join("manifest.json");

        let err = write_index_manifest(&path, &moss(), &out.documents).unwrap_err();
        assert!(matches!(err, PipelineError::NoIndexableDocuments(1)));
        assert!(!path.exists());
    }

    #[test]
    fn output_path_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/data/report.pdf")),
            PathBuf::from("/data/report_parsed.json")
        );
        assert_eq!(
            default_output_path(Path::new("notes.pdf")),
            PathBuf::from("notes_parsed.json")
        );
    }

    #[tokio::test]
    async fn missing_pdf_fails_before_any_request() {
        let client = ParseJobClient::new(&unsiloed("http://127.0.0.1:9")).unwrap();
        let pipeline = IngestPipeline::new(client, ChunkConfig::default()).with_raw_output(None);

        let err = pipeline
            .process_pdf(Path::new("/no/such/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Job(ParseJobError::InputNotFound(_))));
    }

    #[tokio::test]
    async fn process_pdf_dumps_raw_and_aggregates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/parse")
            .with_status(200)
            .with_body(r#"{"job_id":"job-1","quota_remaining":3}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/parse/job-1")
            .with_status(200)
            .with_body(raw_result().to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let raw_path = dir.path().join("raw.json");

        let client = ParseJobClient::new(&unsiloed(&server.url())).unwrap();
        let pipeline = IngestPipeline::new(client, ChunkConfig::default())
            .with_raw_output(Some(raw_path.clone()))
            .with_keywords(Box::new(NoKeywords));

        let out = pipeline.process_pdf(&pdf).await.unwrap();
        assert_eq!(out.summary.documents_out, 4);

        let dumped: Value = serde_json::from_slice(&std::fs::read(&raw_path).unwrap()).unwrap();
        assert_eq!(dumped, raw_result());
    }
}
