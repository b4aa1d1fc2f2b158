//! Media ingestion pipeline.
//!
//! 1. **Watcher**: monitors the media root for new files (debounced,
//!    deduplicated, settle-delayed), plus a startup reconciliation scan
//! 2. **Coordinator**: idempotent record creation and the processing
//!    state machine (`Pending → Processing → Completed/Failed`)
//! 3. **Audio**: audio-only extraction and bounded-length chunking
//! 4. **Transcriber**: sequential per-chunk ASR with offset stitching
//!
//! ```text
//! media root → Watcher → Coordinator → Audio → Transcriber → store
//!                                                  ↓
//!                                          EmbeddingIndexer → index
//! ```

pub mod audio;
pub mod coordinator;
pub mod filter;
pub mod transcriber;
pub mod watcher;

// Re-export key types
pub use audio::{AudioChunk, AudioError, AudioSource};
pub use coordinator::{derive_title, IngestCoordinator, IngestError};
pub use filter::MediaFilter;
pub use transcriber::{TranscribeError, Transcriber};
pub use watcher::{MediaWatcher, ProcessOutcome, ScanReport, WatchHandle, WatcherError};
