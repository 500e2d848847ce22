//! Configuration types for watchlog

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive extraction configuration
///
/// Controls which files count as archives, how completed outputs are named,
/// and which post-commit durability/integrity steps run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// File extensions to treat as archives, without dots (default: `["zip"]`)
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Extension of completed outputs, without dot (default: "txt")
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Suffix carried by in-flight outputs before the rename (default: ".tmp")
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,

    /// Re-read each committed output and compare its MD5 digest (default: true)
    #[serde(default = "default_true")]
    pub verify_checksum: bool,

    /// fsync the output directory after the rename (default: true, unix only)
    #[serde(default = "default_true")]
    pub sync_directory: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            archive_extensions: default_archive_extensions(),
            output_extension: default_output_extension(),
            temp_suffix: default_temp_suffix(),
            verify_checksum: true,
            sync_directory: true,
        }
    }
}

impl ExtractionConfig {
    /// Check if a path carries one of the configured archive extensions
    ///
    /// Matching is ASCII case-insensitive, so `LOGS.ZIP` is an archive.
    pub fn is_archive(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .archive_extensions
                .iter()
                .any(|ae| ae.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Check if a path is named like a completed output
    pub fn is_completed_output(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == self.output_extension)
            .unwrap_or(false)
    }

    /// File name of the completed output for an artifact stem
    pub fn output_file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.output_extension)
    }
}

/// Main configuration for watchlog
///
/// Usually assembled by the binary from an optional TOML file plus command line
/// overrides. The extraction settings are flattened, so a config file reads:
///
/// ```toml
/// watch_paths = ["/srv/sync/app1"]
/// extract_to = ["/srv/logs/app1"]
/// archive_extensions = ["zip"]
/// verify_checksum = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directories to watch for arriving archives
    #[serde(default)]
    pub watch_paths: Vec<PathBuf>,

    /// Output directories, paired 1:1 by position with `watch_paths`
    #[serde(default)]
    pub extract_to: Vec<PathBuf>,

    /// Extraction behaviour
    #[serde(flatten)]
    pub extraction: ExtractionConfig,

    /// Where to write the list of artifacts found at startup (None = don't write)
    #[serde(default)]
    pub seed_manifest: Option<PathBuf>,
}

impl Config {
    /// Load a configuration from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the file cannot be read or is not valid TOML
    /// for this schema.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&text).map_err(|e| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Replace the directory lists with command line values when given
    pub fn with_overrides(mut self, watch_paths: Vec<PathBuf>, extract_to: Vec<PathBuf>) -> Self {
        if !watch_paths.is_empty() {
            self.watch_paths = watch_paths;
        }
        if !extract_to.is_empty() {
            self.extract_to = extract_to;
        }
        self
    }

    /// Validate settings that don't touch the filesystem
    ///
    /// Directory checks happen in [`PathRegistry::build`](crate::registry::PathRegistry::build).
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for unusable extraction settings.
    pub fn validate(&self) -> Result<()> {
        let ext = &self.extraction;

        if ext.archive_extensions.is_empty() {
            return Err(invalid("archive_extensions", "at least one extension is required"));
        }

        if ext.output_extension.is_empty() || ext.output_extension.contains('.') {
            return Err(invalid(
                "output_extension",
                "must be a non-empty extension without dots",
            ));
        }

        if ext
            .archive_extensions
            .iter()
            .any(|ae| ae.eq_ignore_ascii_case(&ext.output_extension))
        {
            return Err(invalid(
                "output_extension",
                "must differ from every archive extension",
            ));
        }

        if ext.temp_suffix.is_empty() {
            return Err(invalid("temp_suffix", "must not be empty"));
        }

        if ext.temp_suffix.trim_start_matches('.') == ext.output_extension {
            return Err(invalid(
                "temp_suffix",
                "must not look like a completed output",
            ));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> crate::error::Error {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
    .into()
}

// Default value functions
fn default_archive_extensions() -> Vec<String> {
    vec!["zip".into()]
}

fn default_output_extension() -> String {
    "txt".into()
}

fn default_temp_suffix() -> String {
    ".tmp".into()
}

fn default_true() -> bool {
    true
}
