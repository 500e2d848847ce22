//! Folder watching for arriving archives
//!
//! This module turns filesystem notifications into extraction requests. It:
//! - Reacts only to move-completion (a file renamed *into* a watched directory),
//!   which is how the sync process signals that a transfer has finished
//! - Watches non-recursively (subdirectories are not monitored)
//! - Runs a one-time reconciliation sweep at startup for archives that arrived
//!   while the process was down
//! - Processes one request at a time, in arrival order
//!
//! # Example
//!
//! ```no_run
//! use watchlog::extraction::ExtractionEngine;
//! use watchlog::folder_watcher::ArrivalWatcher;
//! use watchlog::registry::PathRegistry;
//! use watchlog::tracker::CompletionTracker;
//! use std::path::PathBuf;
//!
//! # async fn example() -> watchlog::Result<()> {
//! let mapping = PathRegistry::build(
//!     &[PathBuf::from("/srv/sync/app")],
//!     &[PathBuf::from("/srv/logs/app")],
//! )?;
//! let tracker = CompletionTracker::default().into_shared();
//!
//! let mut watcher = ArrivalWatcher::new(mapping, ExtractionEngine::default(), tracker)?;
//! watcher.start()?;
//! watcher.reconcile().await?;
//!
//! // Run the watcher (blocks until the process is terminated)
//! watcher.run().await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::extraction::ExtractionEngine;
use crate::registry::{WatchMapping, WatchPair};
use crate::tracker::SharedTracker;
use crate::types::{ArtifactName, ExtractionOutcome, ExtractionRequest, ReconcileReport, WatchEvent};
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Capacity of the outcome broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Watches source directories and feeds arrivals to the extraction engine
pub struct ArrivalWatcher {
    /// Filesystem watcher instance
    watcher: RecommendedWatcher,

    /// Channel for receiving filesystem events
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,

    /// Source/output pairs
    mapping: WatchMapping,

    /// Extraction engine
    engine: ExtractionEngine,

    /// Completion state shared with blocking extraction tasks
    tracker: SharedTracker,

    /// Outcome broadcast (multiple subscribers supported)
    event_tx: broadcast::Sender<WatchEvent>,

    /// Where to write the startup seed manifest, if anywhere
    seed_manifest: Option<PathBuf>,
}

impl ArrivalWatcher {
    /// Create a new arrival watcher
    ///
    /// No directory is watched until [`start`](Self::start) is called.
    ///
    /// # Errors
    /// Returns error if the filesystem watcher cannot be initialized
    pub fn new(
        mapping: WatchMapping,
        engine: ExtractionEngine,
        tracker: SharedTracker,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to send filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            watcher,
            rx,
            mapping,
            engine,
            tracker,
            event_tx,
            seed_manifest: None,
        })
    }

    /// Write the list of seeded artifacts to `path` during reconciliation
    pub fn with_seed_manifest(mut self, path: Option<PathBuf>) -> Self {
        self.seed_manifest = path;
        self
    }

    /// Subscribe to processing outcomes
    ///
    /// Slow subscribers lag and lose events; they never hold up processing.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.event_tx.subscribe()
    }

    /// Shared completion tracker
    pub fn tracker(&self) -> SharedTracker {
        self.tracker.clone()
    }

    /// Start watching every source directory (non-recursive)
    ///
    /// Call this before [`reconcile`](Self::reconcile) so that files arriving
    /// during the sweep are queued rather than missed.
    ///
    /// # Errors
    /// Returns error if any folder cannot be watched (e.g., removed since startup,
    /// permission denied, inotify watch limit reached)
    pub fn start(&mut self) -> Result<()> {
        for pair in self.mapping.iter() {
            self.watcher
                .watch(&pair.source, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    Error::FolderWatch(format!(
                        "Failed to watch folder {}: {}",
                        pair.source.display(),
                        e
                    ))
                })?;

            info!(
                "Watching folder: {} (extracting to {})",
                pair.source.display(),
                pair.output.display()
            );
        }

        Ok(())
    }

    /// Seed completion state and extract archives that arrived while not running
    ///
    /// For each pair, the output directory is seeded first; then every entry of
    /// the source directory whose artifact is not yet known is handed to the engine.
    ///
    /// # Errors
    /// Returns error if a source or output directory cannot be listed
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        {
            let mut tracker = self.tracker.lock().await;
            for pair in self.mapping.iter() {
                report.seeded += tracker.seed(&pair.output)?;
            }

            if let Some(path) = &self.seed_manifest {
                if let Err(e) = tracker.write_manifest(path) {
                    warn!(?path, error = %e, "Failed to write seed manifest");
                }
            }
        }

        for pair in self.mapping.iter() {
            self.reconcile_pair(pair, &mut report).await?;
        }

        info!(
            seeded = report.seeded,
            considered = report.considered,
            extracted = report.extracted,
            skipped = report.skipped,
            ignored = report.ignored,
            failed = report.failed,
            "Startup reconciliation complete"
        );

        let _ = self.event_tx.send(WatchEvent::Reconciled(report.clone()));
        Ok(report)
    }

    async fn reconcile_pair(&self, pair: &WatchPair, report: &mut ReconcileReport) -> Result<()> {
        let mut entries = std::fs::read_dir(&pair.source)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if let Some(name) = ArtifactName::from_path(&path) {
                if self.tracker.lock().await.is_known(&pair.output, &name) {
                    debug!(artifact = %name, "already extracted, not reconsidering");
                    report.skipped += 1;
                    continue;
                }
            }

            debug!(?path, "not in completion set, considering");
            report.considered += 1;
            let outcome = self.dispatch(pair, path).await;
            report.tally(&outcome);
        }

        Ok(())
    }

    /// Run the folder watcher event loop
    ///
    /// Events are handled one at a time; each extraction completes before the
    /// next event is read. Runs until the process is terminated.
    pub async fn run(mut self) {
        info!("Arrival watcher started");

        while let Some(result) = self.rx.recv().await {
            match result {
                Ok(event) => {
                    self.handle_event(event).await;
                }
                Err(e) => {
                    error!("Filesystem watcher error: {}", e);
                }
            }
        }

        info!("Arrival watcher stopped");
    }

    /// Handle a filesystem event
    ///
    /// Only move-completion events are acted on; everything else (creation,
    /// writes, removals, the source half of a rename) is ignored because it can
    /// fire before the file is complete.
    async fn handle_event(&self, event: Event) -> Option<ExtractionOutcome> {
        let path = Self::arrival_path(&event)?.to_path_buf();

        let Some(pair) = self.mapping.pair_for_file(&path) else {
            debug!(?path, "Event outside any watched folder, ignoring");
            return None;
        };

        Some(self.dispatch(pair, path).await)
    }

    /// Extract the destination path of a move-completion event
    ///
    /// inotify reports `IN_MOVED_TO` as `RenameMode::To`. Backends that can't
    /// pair rename halves report `RenameMode::Any`; those count only when the
    /// path exists afterwards, i.e. it is the destination side.
    fn arrival_path(event: &Event) -> Option<&Path> {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.last().map(PathBuf::as_path)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
                .paths
                .last()
                .filter(|p| p.exists())
                .map(PathBuf::as_path),
            _ => None,
        }
    }

    /// Hand one file to the engine and broadcast the outcome
    async fn dispatch(&self, pair: &WatchPair, path: PathBuf) -> ExtractionOutcome {
        let request = ExtractionRequest::new(path, pair.source.clone(), pair.output.clone());
        let archive = request.archive_path.clone();
        let artifact = request.name.clone();

        let outcome = self.engine.consider_shared(request, &self.tracker).await;
        debug!(?archive, outcome = outcome.label(), "Processed arrival");

        let _ = self.event_tx.send(WatchEvent::Processed {
            archive,
            artifact,
            outcome: outcome.clone(),
        });

        outcome
    }
}
