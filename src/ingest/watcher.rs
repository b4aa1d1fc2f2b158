//! Media directory watcher.
//!
//! Watches the media root (recursive) for new files, debounces filesystem
//! events, and hands supported paths to the ingestion coordinator. A shared
//! in-flight set prevents two concurrent runs for the same path; a settle
//! delay avoids reading files still being written. On startup a
//! reconciliation scan picks up files that arrived while nothing was
//! watching, which makes the pipeline self-healing across restarts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::domain::MediaRecord;
use crate::ingest::coordinator::IngestCoordinator;
use crate::ingest::filter::MediaFilter;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Glob error: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Outcome of one per-file processing task
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// The coordinator produced (or returned) a record
    Processed(MediaRecord),

    /// Another task already owns this path
    AlreadyInFlight,

    /// The file vanished or no record could be created
    Abandoned,
}

/// Result of a reconciliation scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Files that went through a processing run
    pub processed: usize,

    /// Files already known to the store
    pub known: usize,

    /// Files that were abandoned or produced no record
    pub failed: usize,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.processed + self.known + self.failed
    }
}

/// Media directory watcher with in-flight deduplication
pub struct MediaWatcher {
    config: Config,
    coordinator: Arc<IngestCoordinator>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MediaWatcher {
    pub fn new(config: Config, coordinator: Arc<IngestCoordinator>) -> Self {
        Self {
            config,
            coordinator,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Begin observing the media root.
    ///
    /// Creates the root if missing, runs the reconciliation scan, then
    /// spawns the watch loop. Emits one [`MediaRecord`] per completed
    /// processing run on the returned channel.
    pub async fn start(
        &self,
    ) -> Result<(mpsc::Receiver<MediaRecord>, WatchHandle), WatcherError> {
        tokio::fs::create_dir_all(&self.config.media_root).await?;

        let report = self.scan_existing().await?;
        tracing::info!(
            processed = report.processed,
            known = report.known,
            failed = report.failed,
            "Reconciliation scan finished"
        );

        let (event_tx, event_rx) = mpsc::channel::<MediaRecord>(100);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let config = self.config.clone();
        let coordinator = self.coordinator.clone();
        let in_flight = self.in_flight.clone();

        let task = tokio::spawn(async move {
            if let Err(e) = run_watcher(config, coordinator, in_flight, event_tx, &mut stop_rx).await
            {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((event_rx, WatchHandle { stop_tx, task }))
    }

    /// One-time reconciliation: process every supported file under the root
    /// that the store does not know yet.
    pub async fn scan_existing(&self) -> Result<ScanReport, WatcherError> {
        let filter = MediaFilter::new(&self.config.extensions);
        let pattern = format!("{}/**/*", self.config.media_root.display());

        let mut report = ScanReport::default();

        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Unreadable path during scan: {}", e);
                    continue;
                }
            };

            if !path.is_file() || !filter.matches(&path) {
                continue;
            }

            if self.coordinator.is_file_processed(&path).await {
                report.known += 1;
                continue;
            }

            tracing::info!(path = %path.display(), "Processing pre-existing file");
            let outcome = process_path(
                self.coordinator.clone(),
                self.in_flight.clone(),
                Duration::from_secs(self.config.settle_delay_secs),
                path,
            )
            .await;

            match outcome {
                ProcessOutcome::Processed(_) => report.processed += 1,
                ProcessOutcome::AlreadyInFlight => {}
                ProcessOutcome::Abandoned => report.failed += 1,
            }
        }

        Ok(report)
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop observing. In-flight processing tasks run to completion.
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.stop_tx.send(()).await;
        self.task.await
    }
}

/// Internal watcher loop
async fn run_watcher(
    config: Config,
    coordinator: Arc<IngestCoordinator>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    event_tx: mpsc::Sender<MediaRecord>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<(), WatcherError> {
    let filter = MediaFilter::new(&config.extensions);
    let settle_delay = Duration::from_secs(config.settle_delay_secs);

    // Debounced watcher; creation and move-in both surface as debounced
    // "any" events for the final path
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&config.media_root, RecursiveMode::Recursive)?;

    tracing::info!("Watching {} for media files", config.media_root.display());

    loop {
        // Check for stop signal
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        // Check for file events (non-blocking with timeout)
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let path = event.path;

                    if !filter.matches(&path) {
                        continue;
                    }

                    match std::fs::metadata(&path) {
                        Ok(metadata) if metadata.is_file() => {}
                        _ => continue,
                    }

                    let coordinator = coordinator.clone();
                    let in_flight = in_flight.clone();
                    let event_tx = event_tx.clone();

                    // One task per path; different paths run in parallel
                    tokio::spawn(async move {
                        let outcome =
                            process_path(coordinator, in_flight, settle_delay, path).await;
                        if let ProcessOutcome::Processed(record) = outcome {
                            let _ = event_tx.send(record).await;
                        }
                    });
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                // Expected - loop back to the stop check
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }

        // Small sleep to prevent busy loop; also the loop's only yield point
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

/// Run one file through the pipeline, guarded by the in-flight set.
///
/// The set is checked-and-inserted before the settle delay and cleared on
/// every exit path, so a second event for the same path while a run is
/// active is a no-op.
pub(crate) async fn process_path(
    coordinator: Arc<IngestCoordinator>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    settle_delay: Duration,
    path: PathBuf,
) -> ProcessOutcome {
    {
        let mut guard = in_flight.lock().unwrap();
        if !guard.insert(path.clone()) {
            tracing::debug!(path = %path.display(), "Path already in flight");
            return ProcessOutcome::AlreadyInFlight;
        }
    }

    let outcome = run_one(&coordinator, settle_delay, &path).await;

    in_flight.lock().unwrap().remove(&path);
    outcome
}

async fn run_one(
    coordinator: &IngestCoordinator,
    settle_delay: Duration,
    path: &Path,
) -> ProcessOutcome {
    // Let writers finish before touching the file
    tokio::time::sleep(settle_delay).await;

    match tokio::fs::File::open(path).await {
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "File not accessible, abandoning");
            return ProcessOutcome::Abandoned;
        }
    }

    match coordinator.process_new_media_file(path).await {
        Some(record) => ProcessOutcome::Processed(record),
        None => ProcessOutcome::Abandoned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaStatus;
    use crate::index::{EmbeddingIndexer, VectorIndex};
    use crate::ingest::audio::write_test_wav;
    use crate::ingest::transcriber::Transcriber;
    use crate::services::{MockAsr, MockEmbedder};
    use crate::store::MediaStore;
    use tempfile::TempDir;

    async fn test_setup(
        temp: &TempDir,
        settle_delay_secs: u64,
    ) -> (MediaWatcher, Arc<IngestCoordinator>, Arc<MediaStore>, Arc<MockAsr>) {
        let config = Config {
            media_root: temp.path().join("media"),
            state_dir: temp.path().join("state"),
            settle_delay_secs,
            ..Config::default()
        };
        tokio::fs::create_dir_all(&config.media_root).await.unwrap();

        let store = Arc::new(
            MediaStore::open(config.media_log_path(), config.lock_path())
                .await
                .unwrap(),
        );
        let index = Arc::new(VectorIndex::open_in_memory().unwrap());
        let asr = Arc::new(MockAsr::new());
        let embedder = Arc::new(MockEmbedder::new(8));

        let transcriber = Transcriber::new(asr.clone(), store.clone(), &config);
        let indexer = EmbeddingIndexer::new(embedder, index, store.clone());
        let coordinator = Arc::new(IngestCoordinator::new(
            store.clone(),
            transcriber,
            indexer,
            &config,
        ));
        let watcher = MediaWatcher::new(config, coordinator.clone());
        (watcher, coordinator, store, asr)
    }

    #[tokio::test]
    async fn test_scan_processes_supported_files_once() {
        let temp = TempDir::new().unwrap();
        let (watcher, _, store, _) = test_setup(&temp, 0).await;

        let media_root = temp.path().join("media");
        write_test_wav(&media_root.join("ep1.wav"), 1.0);
        write_test_wav(&media_root.join("ep2.wav"), 1.0);
        tokio::fs::write(media_root.join("notes.txt"), b"not media")
            .await
            .unwrap();

        let report = watcher.scan_existing().await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.known, 0);

        // The unsupported file never produced a record
        assert_eq!(store.replay().await.unwrap().len(), 2);

        // Scan again - idempotent
        let report = watcher.scan_existing().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.known, 2);
    }

    #[tokio::test]
    async fn test_scan_recurses_into_subdirectories() {
        let temp = TempDir::new().unwrap();
        let (watcher, _, store, _) = test_setup(&temp, 0).await;

        let nested = temp.path().join("media").join("season1");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        write_test_wav(&nested.join("ep1.wav"), 1.0);

        let report = watcher.scan_existing().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(store.replay().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_set_serializes_same_path() {
        let temp = TempDir::new().unwrap();
        let (_, coordinator, store, asr) = test_setup(&temp, 1).await;

        let path = temp.path().join("media").join("ep1.wav");
        write_test_wav(&path, 1.0);

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let delay = Duration::from_secs(1);

        // Two near-simultaneous events for the same path
        let a = tokio::spawn(process_path(
            coordinator.clone(),
            in_flight.clone(),
            delay,
            path.clone(),
        ));
        let b = tokio::spawn(process_path(
            coordinator.clone(),
            in_flight.clone(),
            delay,
            path.clone(),
        ));

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let processed = [&a, &b]
            .iter()
            .filter(|o| matches!(o, ProcessOutcome::Processed(_)))
            .count();
        let skipped = [&a, &b]
            .iter()
            .filter(|o| matches!(o, ProcessOutcome::AlreadyInFlight))
            .count();

        assert_eq!(processed, 1);
        assert_eq!(skipped, 1);
        // Exactly one processing run, one record
        assert_eq!(asr.call_count(), 1);
        assert_eq!(store.replay().await.unwrap().len(), 1);
        // And the set is clear again
        assert!(in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_file_is_abandoned_silently() {
        let temp = TempDir::new().unwrap();
        let (_, coordinator, store, _) = test_setup(&temp, 0).await;

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let outcome = process_path(
            coordinator,
            in_flight.clone(),
            Duration::from_secs(0),
            temp.path().join("media").join("ghost.mp3"),
        )
        .await;

        assert!(matches!(outcome, ProcessOutcome::Abandoned));
        assert!(store.replay().await.unwrap().is_empty());
        assert!(in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_creates_root_and_reconciles() {
        let temp = TempDir::new().unwrap();
        let (watcher, _, store, _) = test_setup(&temp, 0).await;

        // Pre-existing file before start()
        let media_root = temp.path().join("media");
        write_test_wav(&media_root.join("before.wav"), 1.0);

        let (_events, handle) = watcher.start().await.unwrap();

        let record = store
            .get_by_path(&media_root.join("before.wav"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, MediaStatus::Completed);

        handle.stop().await.unwrap();
    }
}
