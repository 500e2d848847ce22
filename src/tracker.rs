//! Completion tracking per output directory
//!
//! The [`CompletionTracker`] is the only authority on whether an artifact has
//! already been produced. It is seeded from existing output at startup and grows
//! as extractions commit; nothing is ever removed from it.

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::extraction::atomic;
use crate::types::ArtifactName;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracker shared between the watcher and blocking extraction tasks
///
/// Holding the guard across check, extract, and record serialises those steps
/// per output directory.
pub type SharedTracker = Arc<tokio::sync::Mutex<CompletionTracker>>;

/// Completed artifact names, keyed by output directory
///
/// Shares its [`ExtractionConfig`] with the engine that writes the outputs, so
/// seeding recognises exactly the files the engine produces.
#[derive(Debug)]
pub struct CompletionTracker {
    config: Arc<ExtractionConfig>,
    sets: HashMap<PathBuf, BTreeSet<ArtifactName>>,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new(Arc::new(ExtractionConfig::default()))
    }
}

impl CompletionTracker {
    /// Create an empty tracker for outputs written under `config`
    ///
    /// Usually obtained through
    /// [`ExtractionEngine::completion_tracker`](crate::extraction::ExtractionEngine::completion_tracker).
    pub fn new(config: Arc<ExtractionConfig>) -> Self {
        Self {
            config,
            sets: HashMap::new(),
        }
    }

    /// Wrap the tracker for sharing with the watcher
    pub fn into_shared(self) -> SharedTracker {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Add every completed output already present in `output_dir`
    ///
    /// Only regular files with the output extension count. Directories, in-flight
    /// temp files, and other extensions are ignored.
    ///
    /// Returns the number of completed outputs found.
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be listed.
    pub fn seed(&mut self, output_dir: &Path) -> Result<usize> {
        let set = self.sets.entry(output_dir.to_path_buf()).or_default();
        let mut found = 0;

        for entry in std::fs::read_dir(output_dir)? {
            let path = entry?.path();

            if !self.config.is_completed_output(&path) {
                continue;
            }

            let is_file = std::fs::metadata(&path)
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            if let Some(name) = ArtifactName::from_path(&path) {
                debug!(artifact = %name, ?output_dir, "seeded completed artifact");
                set.insert(name);
                found += 1;
            }
        }

        info!(
            "Found {} previously-existing artifacts in {}",
            found,
            output_dir.display()
        );

        Ok(found)
    }

    /// Whether `name` has already been produced in `output_dir`
    pub fn is_known(&self, output_dir: &Path, name: &ArtifactName) -> bool {
        self.sets
            .get(output_dir)
            .is_some_and(|set| set.contains(name))
    }

    /// Mark `name` as produced in `output_dir`
    ///
    /// Returns `false` if it was already known.
    pub fn record(&mut self, output_dir: &Path, name: ArtifactName) -> bool {
        self.sets
            .entry(output_dir.to_path_buf())
            .or_default()
            .insert(name)
    }

    /// Number of known artifacts in `output_dir`
    pub fn count(&self, output_dir: &Path) -> usize {
        self.sets.get(output_dir).map_or(0, BTreeSet::len)
    }

    /// Write one `<outputDir>/<ArtifactName>` line per known artifact to `path`
    ///
    /// The manifest is replaced atomically, staged under the configured temp suffix.
    ///
    /// # Errors
    /// Returns an error if the manifest cannot be written or renamed into place.
    pub fn write_manifest(&self, path: &Path) -> Result<usize> {
        let mut dirs: Vec<_> = self.sets.keys().collect();
        dirs.sort();

        let mut contents = String::new();
        let mut lines = 0;
        for dir in dirs {
            for name in &self.sets[dir] {
                contents.push_str(&dir.join(name.as_str()).to_string_lossy());
                contents.push('\n');
                lines += 1;
            }
        }

        atomic::write_file(path, contents.as_bytes(), &self.config.temp_suffix, false)?;
        debug!(?path, lines, "wrote seed manifest");
        Ok(lines)
    }
}
