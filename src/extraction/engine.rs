use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::tracker::{CompletionTracker, SharedTracker};
use crate::types::{ArtifactName, ExtractionOutcome, ExtractionRequest, Verification};
use std::path::Path;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};

use super::atomic;
use super::integrity;
use super::zip::ZipExtractor;

/// Turns one arrived archive into one committed text artifact
///
/// The engine itself holds only configuration; completion state is passed in
/// explicitly so callers decide how it is shared.
#[derive(Clone, Debug)]
pub struct ExtractionEngine {
    config: Arc<ExtractionConfig>,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl ExtractionEngine {
    /// Create an engine with the given extraction settings
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Empty completion tracker that recognises this engine's outputs
    pub fn completion_tracker(&self) -> CompletionTracker {
        CompletionTracker::new(Arc::clone(&self.config))
    }

    /// Decide whether to act on a request and, if so, extract it
    ///
    /// 1. Not an archive, not a regular file, or no usable name: `Ignored`
    /// 2. Artifact already known to the tracker: `Skipped`
    /// 3. Otherwise read, commit atomically, verify, and record: `Extracted`
    ///
    /// Any failure in step 3 yields `Failed` and leaves the artifact unrecorded,
    /// so the next event or restart sweep retries it.
    pub fn consider(
        &self,
        request: &ExtractionRequest,
        tracker: &mut CompletionTracker,
    ) -> ExtractionOutcome {
        let path = &request.archive_path;

        let Some(name) = request.name.as_ref() else {
            debug!(?path, "ignoring file without usable name");
            return ExtractionOutcome::Ignored;
        };

        if !self.config.is_archive(path) || !is_regular_file(path) {
            debug!(?path, "ignoring non-archive");
            return ExtractionOutcome::Ignored;
        }

        if tracker.is_known(&request.output_dir, name) {
            debug!(artifact = %name, "already extracted, skipping");
            return ExtractionOutcome::Skipped;
        }

        match self.extract(path, &request.output_dir, name) {
            Ok(outcome) => {
                tracker.record(&request.output_dir, name.clone());
                outcome
            }
            Err(e) if e.is_archive_error() => {
                warn!(
                    artifact = %name,
                    ?path,
                    error = %e,
                    "archive unreadable, left in place for retry"
                );
                ExtractionOutcome::Failed(e.to_string())
            }
            Err(e) => {
                warn!(
                    artifact = %name,
                    output_dir = ?request.output_dir,
                    error = %e,
                    "failed to commit output, archive left in place for retry"
                );
                ExtractionOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run [`consider`](Self::consider) on a blocking thread against a shared tracker
    ///
    /// The tracker stays locked for the whole flow, so concurrent callers are
    /// serialised and each artifact is extracted at most once.
    pub async fn consider_shared(
        &self,
        request: ExtractionRequest,
        tracker: &SharedTracker,
    ) -> ExtractionOutcome {
        let guard = tracker.clone().lock_owned().await;
        let engine = self.clone();
        let archive = request.archive_path.clone();

        match spawn_blocking(move || {
            let mut guard = guard;
            engine.consider(&request, &mut guard)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(?archive, error = %e, "extraction task panicked");
                ExtractionOutcome::Failed(format!("extraction task panicked: {}", e))
            }
        }
    }

    fn extract(
        &self,
        archive: &Path,
        output_dir: &Path,
        name: &ArtifactName,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let text = ZipExtractor::read_concatenated(archive)?;

        let output = output_dir.join(self.config.output_file_name(name.as_str()));
        let bytes = atomic::write_file(
            &output,
            &text.bytes,
            &self.config.temp_suffix,
            self.config.sync_directory,
        )?;

        info!(
            artifact = %name,
            entries = text.entries,
            bytes,
            "extracted new artifact to {}",
            output.display()
        );

        let verification = if self.config.verify_checksum {
            integrity::verify_committed(&output, &text.bytes)
        } else {
            Verification::Disabled
        };

        if verification.is_problem() {
            warn!(
                ?output,
                ?verification,
                "data integrity warning: committed output does not match archive contents"
            );
        }

        Ok(ExtractionOutcome::Extracted {
            output,
            bytes,
            entries: text.entries,
            verification,
        })
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file())
        .unwrap_or(false)
}
