use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ragkit_core::config::{resolve_with_base, Config};
use ragkit_core::error::{ErrorKind, ErrorResponse};
use ragkit_core::loader::DocumentLoader;
use ragkit_core::types::{documents_from_json, Document};
use ragkit_pipeline::{bootstrap, IndexRequest, PipelineError, QueryRequest, RagPipeline};

/// Retrieval-augmented question answering over a local document index.
#[derive(Debug, Parser)]
#[command(name = "ragkit", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chunk, embed and store documents.
    Index {
        /// Directory of .txt files. Defaults to `data.raw_txt_dir` from config.
        dir: Option<PathBuf>,
        /// JSON file holding `{"documents": [{"content": ..., "metadata": {...}}]}`.
        #[arg(long, conflicts_with = "dir")]
        documents: Option<PathBuf>,
        /// Only load the first N files.
        #[arg(long)]
        limit: Option<usize>,
        /// Documents submitted per index operation.
        #[arg(long, default_value_t = 50)]
        batch: usize,
    },
    /// Answer a question from the indexed documents.
    Query {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Vector count and dimension of the index.
    Stats,
    /// Probe every backend.
    Health,
}

#[derive(Debug, Serialize)]
struct IndexSummary {
    documents: usize,
    indexed_count: usize,
    status: &'static str,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fail(response: &ErrorResponse) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(body) => println!("{body}"),
        Err(_) => eprintln!("{}", response.message),
    }
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(pipeline_err) => {
                error!(stage = %pipeline_err.stage, durably_written = pipeline_err.durably_written(), "operation failed");
                fail(&pipeline_err.to_response())
            }
            None => {
                error!(error = %e, "ragkit failed");
                let response = match e.downcast_ref::<ragkit_core::Error>() {
                    Some(core_err) => ErrorResponse::from(core_err),
                    None => ErrorResponse { error: ErrorKind::Internal, message: format!("{e:#}") },
                };
                fail(&response)
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let settings = config.settings()?;
    let pipeline = bootstrap(&settings).await?;

    match cli.command {
        Command::Index { dir, documents, limit, batch } => {
            let docs = match documents {
                Some(path) => read_documents_file(&path)?,
                None => {
                    let dir = match dir {
                        Some(dir) => dir,
                        None => {
                            let raw: String = config.get("data.raw_txt_dir")?;
                            resolve_with_base(&std::env::current_dir()?, raw)
                        }
                    };
                    let loader = limit.map_or_else(DocumentLoader::new, DocumentLoader::with_limit);
                    loader.load_directory(&dir)?
                }
            };
            let summary = index_in_batches(&pipeline, docs, batch.max(1)).await?;
            print_json(&summary)
        }
        Command::Query { text, top_k, temperature } => {
            let response = pipeline.query(QueryRequest { query: text, top_k, temperature }).await?;
            print_json(&response)
        }
        Command::Stats => print_json(&pipeline.stats().await?),
        Command::Health => print_json(&pipeline.health().await),
    }
}

/// Caller-supplied payloads are validated field by field so failures come
/// back as `invalid_input` naming the offending field.
fn read_documents_file(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| ragkit_core::Error::invalid_input("documents", format!("{} is not valid JSON: {e}", path.display())))?;
    Ok(documents_from_json(&value)?)
}

async fn index_in_batches(pipeline: &RagPipeline, docs: Vec<Document>, batch: usize) -> Result<IndexSummary> {
    let total = docs.len();
    if total == 0 {
        info!("nothing to index");
        return Ok(IndexSummary { documents: 0, indexed_count: 0, status: "success" });
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut indexed_count = 0;
    for slice in docs.chunks(batch) {
        let response = pipeline.index(IndexRequest { documents: slice.to_vec() }).await;
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                pb.abandon_with_message(format!("stopped after {} fragments", indexed_count + e.durably_written()));
                return Err(e.into());
            }
        };
        indexed_count += response.indexed_count;
        pb.inc(slice.len() as u64);
        pb.set_message(format!("{indexed_count} fragments"));
    }
    pb.finish_with_message("indexing completed");
    Ok(IndexSummary { documents: total, indexed_count, status: "success" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_metadata_in_documents_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        std::fs::write(&path, r#"{"documents":[{"content":"x","metadata":{"tags":["a","b"]}}]}"#).unwrap();

        let err = read_documents_file(&path).unwrap_err();
        let core_err = err.downcast_ref::<ragkit_core::Error>().expect("core error");
        let response = ErrorResponse::from(core_err);
        assert_eq!(response.error, ErrorKind::InvalidInput);
        assert!(response.message.contains("documents[0].metadata.tags"), "{}", response.message);
    }

    #[test]
    fn documents_file_with_scalar_metadata_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        std::fs::write(&path, r#"{"documents":[{"content":"Boil water.","metadata":{"page":2}}]}"#).unwrap();
        let docs = read_documents_file(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["page"], ragkit_core::types::MetadataValue::Integer(2));
    }
}
