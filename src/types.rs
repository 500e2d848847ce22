//! Core types for watchlog

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable identity of a logical artifact
///
/// The archive's base filename without its extension. It joins an input
/// archive (`<name>.zip`) to its completed output (`<name>.txt`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Derive the artifact name from a file path
    ///
    /// Returns `None` when the path has no file stem or the stem is not valid UTF-8.
    ///
    /// ```
    /// use watchlog::types::ArtifactName;
    /// use std::path::Path;
    ///
    /// let name = ArtifactName::from_path(Path::new("/sync/app-2024-01-01.zip")).unwrap();
    /// assert_eq!(name.as_str(), "app-2024-01-01");
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// One detected file, ready for the engine
///
/// Created per startup-scan entry or move-completion event and discarded once
/// the engine has produced an [`ExtractionOutcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Full path of the arrived file
    pub archive_path: PathBuf,
    /// Watched directory the file arrived in
    pub source_dir: PathBuf,
    /// Paired output directory
    pub output_dir: PathBuf,
    /// Derived artifact name (None if the file name has no usable stem)
    pub name: Option<ArtifactName>,
}

impl ExtractionRequest {
    /// Build a request for a file inside `source_dir`
    pub fn new(archive_path: PathBuf, source_dir: PathBuf, output_dir: PathBuf) -> Self {
        let name = ArtifactName::from_path(&archive_path);
        Self {
            archive_path,
            source_dir,
            output_dir,
            name,
        }
    }
}

/// Result of the post-commit integrity check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Committed file matches the extracted bytes
    Verified,
    /// Committed file differs from the extracted bytes (hex MD5 digests)
    Mismatch {
        /// Digest of the bytes read from the archive
        expected: String,
        /// Digest of the file now on disk
        actual: String,
    },
    /// The committed file could not be re-read
    Unverifiable(String),
    /// Checking is turned off in configuration
    Disabled,
}

impl Verification {
    /// Whether this result should be surfaced as a data-integrity warning
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Verification::Mismatch { .. } | Verification::Unverifiable(_)
        )
    }
}

/// What the engine did with one request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// Wrong extension, not a regular file, or no usable name
    Ignored,
    /// Artifact already produced
    Skipped,
    /// New artifact committed
    Extracted {
        /// Final output path
        output: PathBuf,
        /// Bytes written
        bytes: u64,
        /// Number of archive entries concatenated
        entries: usize,
        /// Post-commit integrity check result
        verification: Verification,
    },
    /// Extraction failed; the artifact stays eligible for retry
    Failed(String),
}

impl ExtractionOutcome {
    /// Short label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Ignored => "ignored",
            ExtractionOutcome::Skipped => "skipped",
            ExtractionOutcome::Extracted { .. } => "extracted",
            ExtractionOutcome::Failed(_) => "failed",
        }
    }
}

/// Totals from a startup reconciliation sweep
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Artifacts found already completed in output directories
    pub seeded: usize,
    /// Source entries handed to the engine
    pub considered: usize,
    /// New artifacts produced
    pub extracted: usize,
    /// Source entries whose artifact was already known
    pub skipped: usize,
    /// Source entries that are not archives
    pub ignored: usize,
    /// Archives that failed to extract
    pub failed: usize,
}

impl ReconcileReport {
    /// Count one engine outcome
    pub fn tally(&mut self, outcome: &ExtractionOutcome) {
        match outcome {
            ExtractionOutcome::Ignored => self.ignored += 1,
            ExtractionOutcome::Skipped => self.skipped += 1,
            ExtractionOutcome::Extracted { .. } => self.extracted += 1,
            ExtractionOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Event emitted by the watcher
///
/// Consumers subscribe via [`ArrivalWatcher::subscribe`](crate::folder_watcher::ArrivalWatcher::subscribe).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEvent {
    /// Startup reconciliation finished
    Reconciled(ReconcileReport),

    /// One arrived file was processed
    Processed {
        /// Path of the arrived file
        archive: PathBuf,
        /// Artifact name, if one could be derived
        artifact: Option<ArtifactName>,
        /// What the engine did
        outcome: ExtractionOutcome,
    },
}
