use super::library::LibraryIndex;
use super::probe::MetadataProbe;
use super::{is_audio_file, Track};
use crate::config::ScanConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Cooperative cancellation flag, polled by the scanner between files
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a scan ended. Cancellation is a normal outcome carrying the tracks
/// processed so far.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(LibraryIndex),
    Cancelled(LibraryIndex),
}

impl ScanOutcome {
    pub fn index(&self) -> &LibraryIndex {
        match self {
            ScanOutcome::Completed(index) | ScanOutcome::Cancelled(index) => index,
        }
    }

    pub fn into_index(self) -> LibraryIndex {
        match self {
            ScanOutcome::Completed(index) | ScanOutcome::Cancelled(index) => index,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled(_))
    }
}

/// Ordered stream of events a scan sends back to its owner
#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started { root: PathBuf, total: usize },
    TrackFound { track: Track, processed: usize, total: usize },
    Error { path: PathBuf, error: String },
    /// Always the last event of a scan
    Finished(ScanOutcome),
}

impl ScanProgress {
    /// Determinate progress in `[0, 1]`, where the event carries one
    pub fn fraction(&self) -> Option<f32> {
        match self {
            ScanProgress::Started { .. } => Some(0.0),
            ScanProgress::TrackFound { processed, total, .. } => {
                Some(progress_fraction(*processed, *total))
            }
            ScanProgress::Error { .. } => None,
            ScanProgress::Finished(ScanOutcome::Completed(index)) => {
                Some(if index.is_empty() { 0.0 } else { 1.0 })
            }
            ScanProgress::Finished(ScanOutcome::Cancelled(_)) => None,
        }
    }
}

/// `processed / total`, defined as 0 for an empty scan
pub fn progress_fraction(processed: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        (processed.min(total) as f32) / (total as f32)
    }
}

/// A scan running in the background
pub struct ScanHandle {
    pub progress: mpsc::Receiver<ScanProgress>,
    cancel: CancelToken,
    task: JoinHandle<ScanOutcome>,
}

impl ScanHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn into_parts(self) -> (mpsc::Receiver<ScanProgress>, CancelToken, JoinHandle<ScanOutcome>) {
        (self.progress, self.cancel, self.task)
    }
}

#[derive(Clone)]
pub struct LibraryScanner {
    probe: MetadataProbe,
    follow_links: bool,
    skip_hidden: bool,
}

impl LibraryScanner {
    pub fn new(probe: MetadataProbe) -> Self {
        Self {
            probe,
            follow_links: true,
            skip_hidden: true,
        }
    }

    pub fn from_config(config: &ScanConfig, probe: MetadataProbe) -> Self {
        Self {
            probe,
            follow_links: config.follow_links,
            skip_hidden: config.skip_hidden,
        }
    }

    /// Every audio file under `root`, materialized up front so the total is
    /// known before any metadata is read.
    pub fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let skip_hidden = self.skip_hidden;
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skip_hidden || e.depth() == 0 || !is_hidden(e.path()));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }

        files
    }

    /// Run one scan to completion or cancellation.
    ///
    /// Cancellation is checked before each file; a probe already in flight
    /// finishes first. A closed progress channel does not stop the scan.
    pub async fn scan(
        &self,
        root: &Path,
        cancel: &CancelToken,
        progress_tx: mpsc::Sender<ScanProgress>,
    ) -> ScanOutcome {
        let files = {
            let scanner = self.clone();
            let walk_root = root.to_path_buf();
            match tokio::task::spawn_blocking(move || scanner.collect_files(&walk_root)).await {
                Ok(files) => files,
                Err(e) => {
                    warn!("Directory walk failed for {}: {}", root.display(), e);
                    let _ = progress_tx
                        .send(ScanProgress::Error {
                            path: root.to_path_buf(),
                            error: e.to_string(),
                        })
                        .await;
                    Vec::new()
                }
            }
        };

        let total = files.len();
        info!("Scanning {} ({} audio files)", root.display(), total);
        let _ = progress_tx
            .send(ScanProgress::Started {
                root: root.to_path_buf(),
                total,
            })
            .await;

        let mut tracks = Vec::with_capacity(total);
        let mut cancelled = false;

        for path in &files {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let track = self.probe.probe(path).await;
            tracks.push(track.clone());

            let _ = progress_tx
                .send(ScanProgress::TrackFound {
                    track,
                    processed: tracks.len(),
                    total,
                })
                .await;
        }

        let processed = tracks.len();
        let index = LibraryIndex::new(root, tracks);
        let outcome = if cancelled {
            info!("Scan of {} cancelled after {}/{} files", root.display(), processed, total);
            ScanOutcome::Cancelled(index)
        } else {
            info!("Scan of {} complete: {} tracks", root.display(), processed);
            ScanOutcome::Completed(index)
        };

        let _ = progress_tx.send(ScanProgress::Finished(outcome.clone())).await;
        outcome
    }

    /// Start a scan on the runtime and hand back its progress stream.
    pub fn spawn(&self, root: PathBuf) -> ScanHandle {
        let (progress_tx, progress_rx) = mpsc::channel(128);
        let cancel = CancelToken::new();

        let task = {
            let scanner = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scanner.scan(&root, &cancel, progress_tx).await })
        };
        debug!("Library scan task spawned");

        ScanHandle {
            progress: progress_rx,
            cancel,
            task,
        }
    }
}

impl Default for LibraryScanner {
    fn default() -> Self {
        Self::new(MetadataProbe::default())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}
