use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rag_backend::config::EnvVars;
use rag_backend::models::Document;
use rag_backend::providers::resolve_vector_store;

#[derive(Parser, Debug)]
#[command(name = "rag-ingest")]
#[command(about = "Ingest documents into the configured vector store")]
struct Args {
    /// JSON array or JSON-lines file of `{page_content, metadata}` documents
    #[arg(short, long)]
    file: PathBuf,

    /// Drop and recreate the configured collection before ingesting
    #[arg(long, conflicts_with = "cache_collection")]
    fresh: bool,

    /// Ingest into this collection in a single request instead
    #[arg(long)]
    cache_collection: Option<String>,
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_digest(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

fn parse_documents(contents: &str) -> Result<Vec<Document>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("invalid JSON document array");
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid document on line {}", n + 1))
        })
        .collect()
}

fn read_documents(path: &Path) -> Result<(Vec<Document>, String)> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok((parse_documents(&contents)?, file_digest(&contents)))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .init();

    let args = Args::parse();

    if !args.file.exists() {
        anyhow::bail!("File does not exist: {}", args.file.display());
    }

    let (documents, digest) = read_documents(&args.file)?;
    println!("Loaded {} documents from {} ({})", documents.len(), args.file.display(), digest);

    if documents.is_empty() {
        println!("Nothing to ingest. Exiting.");
        return Ok(());
    }

    let vector_store = resolve_vector_store(&EnvVars::from_process())?;
    let target = args
        .cache_collection
        .clone()
        .unwrap_or_else(|| vector_store.collection_name().to_string());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Ingesting into {}", target));

    let result = match args.cache_collection {
        Some(ref collection) => vector_store.cache_documents(&documents, collection).await,
        None => vector_store.add_documents(&documents, args.fresh).await,
    };

    let ids = match result {
        Ok(ids) => {
            pb.finish_with_message("done");
            ids
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
    };

    println!("\nIngestion complete!");
    println!("  Documents:   {}", documents.len());
    println!("  Ids:         {}", ids.len());
    println!("  Collection:  {}", target);
    println!("  Backend:     {}", vector_store.provider_name());

    Ok(())
}
