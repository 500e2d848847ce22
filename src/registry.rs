//! Pairing of watched source directories with output directories
//!
//! [`PathRegistry::build`] validates the configured directory lists and produces an
//! immutable [`WatchMapping`]. All paths are canonicalised so that paths reported by
//! the watch backend compare equal to the registered source directory.

use crate::error::{ConfigError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One watched directory and the directory its artifacts are extracted to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchPair {
    /// Directory watched for arriving archives
    pub source: PathBuf,
    /// Directory completed outputs are written to
    pub output: PathBuf,
}

/// Ordered, validated set of (source, output) pairs
///
/// Source directories are unique, as are output directories. Created once at
/// startup and never modified afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchMapping {
    pairs: Vec<WatchPair>,
}

impl WatchMapping {
    /// Iterate over pairs in configuration order
    pub fn iter(&self) -> std::slice::Iter<'_, WatchPair> {
        self.pairs.iter()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the mapping has no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Find the pair whose source directory directly contains `path`
    ///
    /// Watches are non-recursive, so only the immediate parent is compared.
    pub fn pair_for_file(&self, path: &Path) -> Option<&WatchPair> {
        let parent = path.parent()?;
        self.pairs.iter().find(|pair| pair.source == parent)
    }
}

impl<'a> IntoIterator for &'a WatchMapping {
    type Item = &'a WatchPair;
    type IntoIter = std::slice::Iter<'a, WatchPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Builds [`WatchMapping`] values from configuration
pub struct PathRegistry;

impl PathRegistry {
    /// Validate and pair the directory lists positionally
    ///
    /// # Errors
    /// - [`ConfigError::CountMismatch`] if the lists differ in length
    /// - [`ConfigError::InvalidPath`] if a directory does not exist, is not a
    ///   directory, cannot be listed, or (for outputs) a file cannot be created in it
    /// - [`ConfigError::DuplicatePath`] if a directory repeats on either side
    pub fn build(source_dirs: &[PathBuf], output_dirs: &[PathBuf]) -> Result<WatchMapping> {
        if source_dirs.len() != output_dirs.len() {
            return Err(ConfigError::CountMismatch {
                watch: source_dirs.len(),
                extract: output_dirs.len(),
            }
            .into());
        }

        let mut seen_sources = HashSet::new();
        let mut seen_outputs = HashSet::new();
        let mut pairs = Vec::with_capacity(source_dirs.len());

        for (source, output) in source_dirs.iter().zip(output_dirs) {
            let source = validate_dir(source, false)?;
            let output = validate_dir(output, true)?;

            if !seen_sources.insert(source.clone()) {
                return Err(ConfigError::DuplicatePath { path: source }.into());
            }
            if !seen_outputs.insert(output.clone()) {
                return Err(ConfigError::DuplicatePath { path: output }.into());
            }

            debug!(source = ?source, output = ?output, "registered watch pair");
            pairs.push(WatchPair { source, output });
        }

        Ok(WatchMapping { pairs })
    }
}

/// Canonicalise a directory and check it is usable
fn validate_dir(path: &Path, needs_write: bool) -> Result<PathBuf> {
    let invalid = |reason: String| ConfigError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    let canonical = path.canonicalize().map_err(|e| invalid(e.to_string()))?;

    let metadata = std::fs::metadata(&canonical).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()).into());
    }

    std::fs::read_dir(&canonical).map_err(|e| invalid(format!("cannot list directory: {}", e)))?;

    // Mode bits alone miss ownership and ACLs, so create a real (unlinked) file.
    if needs_write {
        tempfile::tempfile_in(&canonical)
            .map_err(|e| invalid(format!("directory is not writable: {}", e)))?;
    }

    Ok(canonical)
}
