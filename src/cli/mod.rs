//! Command-line interface for earshot.
//!
//! Commands for running the watch pipeline, reconciling the media root,
//! inspecting the store, and querying the vector index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::{self, Config};
use crate::index::{EmbeddingIndexer, VectorIndex};
use crate::ingest::{IngestCoordinator, MediaWatcher, Transcriber};
use crate::search::SearchEngine;
use crate::services::{EmbeddingService, HttpAsrClient, HttpEmbeddingClient};
use crate::store::MediaStore;

/// earshot - media ingestion and semantic indexing pipeline
#[derive(Parser, Debug)]
#[command(name = "earshot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (searches ./earshot.yaml and parents if not set)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the media root and process new files until Ctrl+C
    Watch,

    /// Reconcile the media root once: process files not yet ingested
    Scan,

    /// Show store status summary
    Status,

    /// List media records
    List {
        /// Filter by status (pending, processing, completed, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Semantic search over transcript segments
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum similarity in [0, 1]
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,
    },

    /// Recommend segments similar to an indexed segment
    Recommend {
        /// Segment id (UUID)
        segment_id: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = match self.config {
            Some(path) => config::load_from(Some(path))?,
            None => config::load()?,
        };

        match self.command {
            Commands::Watch => execute_watch(config).await,
            Commands::Scan => execute_scan(config).await,
            Commands::Status => execute_status(config).await,
            Commands::List { status, limit } => execute_list(config, status, limit).await,
            Commands::Search {
                query,
                limit,
                threshold,
            } => execute_search(config, &query, limit, threshold).await,
            Commands::Recommend { segment_id, limit } => {
                execute_recommend(config, &segment_id, limit).await
            }
            Commands::Config => execute_config(config),
        }
    }
}

/// Wire the full ingestion pipeline from configuration.
async fn build_pipeline(config: &Config) -> Result<(MediaWatcher, Arc<MediaStore>)> {
    let store = Arc::new(
        MediaStore::open(config.media_log_path(), config.lock_path())
            .await
            .context("Failed to open media store")?,
    );
    let index =
        Arc::new(VectorIndex::open(&config.vector_index_path()).context("Failed to open vector index")?);

    let asr = Arc::new(HttpAsrClient::new(
        config.asr_url.clone(),
        config.asr_model.clone(),
        config.language.clone(),
        config.asr_timeout_secs,
    )?);
    let embedder = build_embedder(config)?;

    let transcriber = Transcriber::new(asr, store.clone(), config);
    let indexer = EmbeddingIndexer::new(embedder, index, store.clone());
    let coordinator = Arc::new(IngestCoordinator::new(
        store.clone(),
        transcriber,
        indexer,
        config,
    ));

    Ok((MediaWatcher::new(config.clone(), coordinator), store))
}

fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingService>> {
    Ok(Arc::new(HttpEmbeddingClient::new(
        config.embedding_url.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
        config.embedding_timeout_secs,
    )?))
}

/// Watch the media root until Ctrl+C
async fn execute_watch(config: Config) -> Result<()> {
    let media_root = config.media_root.clone();
    let (watcher, _store) = build_pipeline(&config).await?;

    println!("Watching: {}", media_root.display());
    println!("   Press Ctrl+C to stop");
    println!();

    let (mut event_rx, handle) = watcher.start().await?;

    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = stop_tx.send(());
    });

    loop {
        tokio::select! {
            Some(record) = event_rx.recv() => {
                println!(
                    "Processed: {} [{}] ({})",
                    record.file_name,
                    record.status,
                    &record.content_hash[..8.min(record.content_hash.len())]
                );
            }
            _ = &mut stop_rx => {
                println!();
                println!("Stopping watcher...");
                handle.stop().await?;
                break;
            }
        }
    }

    Ok(())
}

/// One-shot reconciliation scan
async fn execute_scan(config: Config) -> Result<()> {
    let media_root = config.media_root.clone();
    let (watcher, _store) = build_pipeline(&config).await?;

    println!("Scanning: {}", media_root.display());

    let report = watcher.scan_existing().await?;

    println!();
    println!("Scan Results:");
    println!("  Processed:       {}", report.processed);
    println!("  Already known:   {}", report.known);
    if report.failed > 0 {
        println!("  Failed:          {}", report.failed);
    }
    println!("  Total:           {}", report.total());

    Ok(())
}

/// Show store summary
async fn execute_status(config: Config) -> Result<()> {
    let store = MediaStore::open_read_only(config.media_log_path());
    let summary = store.summary().await?;

    let index_len = VectorIndex::open(&config.vector_index_path())
        .and_then(|index| index.len())
        .unwrap_or(0);

    println!();
    println!("Media Pipeline Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Media root:  {}", config.media_root.display());
    println!("State dir:   {}", config.state_dir.display());
    println!();
    println!("Records:");
    println!("  Pending:    {}", summary.pending);
    println!("  Processing: {}", summary.processing);
    println!("  Completed:  {}", summary.completed);
    println!("  Failed:     {}", summary.failed);
    println!("  Total:      {}", summary.total());
    println!();
    println!("Indexed segments: {}", index_len);

    Ok(())
}

/// List media records
async fn execute_list(config: Config, status_filter: Option<String>, limit: usize) -> Result<()> {
    let store = MediaStore::open_read_only(config.media_log_path());
    let entries = store.list().await?;

    let filtered: Vec<_> = entries
        .into_iter()
        .filter(|entry| {
            if let Some(ref filter) = status_filter {
                entry.record.status.to_string() == *filter
            } else {
                true
            }
        })
        .collect();

    if filtered.is_empty() {
        println!("No media records");
        if status_filter.is_some() {
            println!("  (filtered by status: {:?})", status_filter);
        }
        return Ok(());
    }

    println!();
    println!(
        "{:<38} {:<12} {:<30} {:<9}",
        "ID", "STATUS", "TITLE", "SEGMENTS"
    );
    println!("{}", "-".repeat(92));

    for entry in filtered.iter().take(limit) {
        let title = if entry.record.title.len() > 28 {
            format!("{}...", &entry.record.title[..25])
        } else {
            entry.record.title.clone()
        };

        println!(
            "{:<38} {:<12} {:<30} {:<9}",
            entry.record.id,
            entry.record.status.to_string(),
            title,
            entry.segments.len()
        );
    }

    let total = filtered.len();
    if total > limit {
        println!();
        println!("  (showing {} of {} records)", limit, total);
    }

    Ok(())
}

/// Semantic search
async fn execute_search(config: Config, query: &str, limit: usize, threshold: f64) -> Result<()> {
    let index = Arc::new(VectorIndex::open(&config.vector_index_path())?);
    let embedder = build_embedder(&config)?;
    let engine = SearchEngine::new(embedder, index);

    let hits = engine.search(query, limit, threshold).await;

    if hits.is_empty() {
        println!("No matches for {:?} (threshold {})", query, threshold);
        return Ok(());
    }

    println!();
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {:.1}s-{:.1}s  {}",
            i + 1,
            hit.similarity,
            hit.metadata.start_time,
            hit.metadata.end_time,
            hit.text
        );
        println!("   segment: {}  media: {}", hit.segment_id, hit.metadata.media_id);
    }

    Ok(())
}

/// Segment recommendations
async fn execute_recommend(config: Config, segment_id: &str, limit: usize) -> Result<()> {
    let segment_id: Uuid = segment_id
        .parse()
        .with_context(|| format!("Invalid segment id: {}", segment_id))?;

    let index = Arc::new(VectorIndex::open(&config.vector_index_path())?);
    let embedder = build_embedder(&config)?;
    let engine = SearchEngine::new(embedder, index);

    let hits = engine.recommend(segment_id, limit).await;

    if hits.is_empty() {
        println!("No recommendations for segment {}", segment_id);
        return Ok(());
    }

    println!();
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {:.1}s-{:.1}s  {}",
            i + 1,
            hit.similarity,
            hit.metadata.start_time,
            hit.metadata.end_time,
            hit.text
        );
        println!("   segment: {}  media: {}", hit.segment_id, hit.metadata.media_id);
    }

    Ok(())
}

/// Show resolved configuration
fn execute_config(config: Config) -> Result<()> {
    println!();
    println!("Earshot Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Media root:        {}", config.media_root.display());
    println!("State dir:         {}", config.state_dir.display());
    println!("Settle delay:      {} seconds", config.settle_delay_secs);
    println!("Extensions:        {:?}", config.extensions);
    println!();
    println!("Chunk length:      {} seconds", config.chunk_seconds);
    println!("ASR endpoint:      {}", config.asr_url);
    println!("ASR model:         {}", config.asr_model);
    println!("Language:          {}", config.language);
    println!();
    println!("Embedding endpoint: {}", config.embedding_url);
    println!("Embedding model:    {}", config.embedding_model);
    println!("Dimension:          {}", config.embedding_dimension);
    println!();
    match config.config_file {
        Some(ref path) => println!("Config file:       {}", path.display()),
        None => println!("Config file:       (defaults)"),
    }

    if config.media_root.exists() {
        println!("✓ Media root exists");
    } else {
        println!("⚠ Media root does not exist (it will be created on watch)");
    }

    Ok(())
}
