//! earshot - media ingestion and semantic indexing pipeline
//!
//! Media files dropped into a watched directory are transcribed and indexed
//! into a semantically searchable store of timestamped transcript segments.
//!
//! # Architecture
//!
//! ```text
//! Watcher → Coordinator → Audio Extractor → Transcriber → media store
//!                                                ↓
//!                                       Embedding Indexer → vector index
//!                                                                ↑
//!                                                      Search Engine reads
//! ```
//!
//! - The watcher debounces filesystem events, deduplicates in-flight paths,
//!   and reconciles pre-existing files on startup
//! - Ingestion is idempotent on the canonical file path; each record moves
//!   through `Pending → Processing → {Completed, Failed}`
//! - Audio is chunked into bounded-length pieces; segment timestamps are
//!   stitched from accumulated chunk durations, so they are absolute
//! - Per-segment embeddings land in a vector index serving similarity
//!   search and recommendations
//!
//! # Modules
//!
//! - `ingest`: watcher, coordinator, audio extraction, transcriber
//! - `store`: append-only media store (JSONL, replayed state)
//! - `index`: embedding indexer and the segment vector index
//! - `search`: similarity search and recommendations
//! - `services`: ASR and embedding collaborators (HTTP + mocks)
//! - `cli`: command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod index;
pub mod ingest;
pub mod search;
pub mod services;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use domain::{MediaRecord, MediaStatus, SearchHit, Segment, TranscriptionRecord, VectorEntry};
pub use index::{EmbeddingIndexer, VectorIndex};
pub use ingest::{IngestCoordinator, MediaWatcher, Transcriber};
pub use search::SearchEngine;
pub use services::{AsrService, EmbeddingService};
pub use store::MediaStore;
