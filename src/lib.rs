//! # watchlog
//!
//! Watches directories fed by an external file-sync process and, for every
//! newly-arrived ZIP archive, extracts its contents into a paired output
//! directory as a single text file, exactly once across restarts.
//!
//! ## Pipeline
//!
//! ```text
//! ArrivalWatcher (startup sweep, then move-completion events)
//!     -> ExtractionEngine::consider
//!         -> CompletionTracker::is_known ? Skipped : extract -> CompletionTracker::record
//! ```
//!
//! - A file counts as arrived only when it is *moved* into a watched directory.
//! - Output is written to a temp file, fsynced, then renamed into place, so a
//!   `<name>.txt` in an output directory is always complete.
//! - Completion state is rebuilt at startup from the output directories
//!   themselves; no separate database is kept.
//!
//! ## Quick Start
//!
//! ```no_run
//! use watchlog::{ArrivalWatcher, CompletionTracker, ExtractionEngine, PathRegistry};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mapping = PathRegistry::build(
//!         &[PathBuf::from("/srv/sync/app")],
//!         &[PathBuf::from("/srv/logs/app")],
//!     )?;
//!
//!     let tracker = CompletionTracker::default().into_shared();
//!     let mut watcher = ArrivalWatcher::new(mapping, ExtractionEngine::default(), tracker)?;
//!
//!     // Subscribe to outcomes
//!     let mut events = watcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     watcher.start()?;
//!     watcher.reconcile().await?;
//!     watchlog::run_until_signal(watcher).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Folder watching for arriving archives
pub mod folder_watcher;
/// Source/output directory pairing
pub mod registry;
/// Completion tracking
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, ExtractionConfig};
pub use error::{ConfigError, Error, ExtractionError, Result};
pub use extraction::ExtractionEngine;
pub use folder_watcher::ArrivalWatcher;
pub use registry::{PathRegistry, WatchMapping, WatchPair};
pub use tracker::{CompletionTracker, SharedTracker};
pub use types::{
    ArtifactName, ExtractionOutcome, ExtractionRequest, ReconcileReport, Verification, WatchEvent,
};

/// Run the watcher until the process receives a termination signal.
///
/// The watcher itself has no shutdown trigger; this is the external termination.
/// In-flight extraction is not cancelled cleanly, but because output only
/// becomes visible at the rename, an interrupted extraction leaves nothing that
/// looks complete.
///
/// On unix both SIGTERM and SIGINT stop the watcher; elsewhere Ctrl+C does.
pub async fn run_until_signal(watcher: ArrivalWatcher) {
    tokio::select! {
        _ = watcher.run() => {}
        signal = termination_signal() => {
            tracing::info!(signal, "Stopping arrival watcher");
        }
    }
}

/// Resolves with the name of the first termination signal received
///
/// If no handler can be installed this never resolves, so the watcher keeps
/// running rather than exiting on startup.
#[cfg(unix)]
async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Ok(mut term), Err(e)) => {
            tracing::warn!(error = %e, "SIGINT unavailable, watcher stops on SIGTERM only");
            term.recv().await;
            "SIGTERM"
        }
        (Err(e), Ok(mut int)) => {
            tracing::warn!(error = %e, "SIGTERM unavailable, watcher stops on SIGINT only");
            int.recv().await;
            "SIGINT"
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "no signal handler could be installed");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Ctrl+C handler could not be installed");
        return std::future::pending().await;
    }
    "Ctrl+C"
}
