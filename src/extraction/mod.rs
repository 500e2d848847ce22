//! Archive extraction into single text artifacts
//!
//! This module turns one arrived ZIP archive into one `<name>.txt` file in the
//! paired output directory. Entry contents are concatenated in the archive's
//! enumeration order, committed with a temp-file-then-rename, and re-read to
//! check their MD5 digest.

pub(crate) mod atomic;
mod engine;
pub mod integrity;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use engine::ExtractionEngine;
pub use zip::{ExtractedText, ZipExtractor};
