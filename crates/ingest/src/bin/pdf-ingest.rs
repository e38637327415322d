//! pdf-ingest -- parse a PDF with the layout API and format it for indexing.
//!
//! `parse` runs the full pipeline against the remote service; `format`
//! re-aggregates a raw result saved by an earlier run.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use moss_core::config::{self, Config};
use moss_ingest::pipeline::{self, DEFAULT_RAW_JSON_PATH};
use moss_ingest::{ChunkConfig, IngestOutput, IngestPipeline, ParseJobClient, YakeExtractor};

// ── CLI ─────────────────────────────────────────────────────────────

/// Parse PDFs into overlapping, keyword-tagged documents for the Moss index.
#[derive(Parser, Debug)]
#[command(name = "pdf-ingest", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF, wait for the parse job, and write the formatted documents.
    Parse {
        /// PDF to parse.
        input: PathBuf,

        /// Formatted output (default: `<input stem>_parsed.json`).
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Where to save the unformatted parse result.
        #[arg(long, default_value = DEFAULT_RAW_JSON_PATH)]
        raw_output: PathBuf,

        /// Do not save the unformatted parse result.
        #[arg(long)]
        no_raw: bool,

        /// Also write an index manifest with only indexable documents.
        #[arg(long)]
        manifest: Option<PathBuf>,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },
    /// Re-format a raw parse result saved by `parse`.
    Format {
        /// Raw parse result JSON.
        raw_json: PathBuf,

        /// Formatted output (default: `<raw stem>_parsed.json`).
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },
}

#[derive(Args, Debug)]
struct ChunkingArgs {
    /// Token budget per document (overrides CHUNK_MAX_TOKENS).
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Words shared by consecutive windows (overrides CHUNK_OVERLAP_TOKENS).
    #[arg(long)]
    overlap: Option<usize>,
}

impl ChunkingArgs {
    fn resolve(&self, config: &Config) -> anyhow::Result<ChunkConfig> {
        let max = self.max_tokens.unwrap_or(config.chunking.max_tokens_per_chunk);
        let overlap = self.overlap.unwrap_or(config.chunking.overlap_tokens);
        ChunkConfig::new(max, overlap).context("invalid chunking options")
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let output = match cli.command {
        Command::Parse {
            input,
            output,
            raw_output,
            no_raw,
            manifest,
            chunking,
        } => {
            let chunk_config = chunking.resolve(&config)?;
            let client = ParseJobClient::from_config(&config)?;
            let ingest = IngestPipeline::new(client, chunk_config)
                .with_raw_output((!no_raw).then_some(raw_output));

            let result = ingest
                .process_pdf(&input)
                .await
                .with_context(|| format!("failed to process {}", input.display()))?;

            let out_path = output.unwrap_or_else(|| pipeline::default_output_path(&input));
            pipeline::write_documents(&out_path, &result.documents)?;

            if let Some(manifest_path) = manifest {
                pipeline::write_index_manifest(&manifest_path, &config.moss, &result.documents)?;
            }
            result
        }
        Command::Format {
            raw_json,
            output,
            chunking,
        } => {
            let chunk_config = chunking.resolve(&config)?;
            let result = pipeline::format_file(&raw_json, &chunk_config, &YakeExtractor::default())
                .with_context(|| format!("failed to format {}", raw_json.display()))?;

            let out_path = output.unwrap_or_else(|| pipeline::default_output_path(&raw_json));
            pipeline::write_documents(&out_path, &result.documents)?;
            result
        }
    };

    report(&output);
    Ok(())
}

fn report(output: &IngestOutput) {
    output.summary.log();
    if let Some(first) = output.documents.iter().find(|d| d.is_indexable()) {
        info!(
            id = %first.id,
            metadata = ?first.metadata,
            "first document"
        );
    }
}
