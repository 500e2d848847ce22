use crate::error::ExtractionError;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Contents of an archive flattened into one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Entry contents concatenated in the archive's enumeration order
    pub bytes: Vec<u8>,
    /// Number of file entries that contributed
    pub entries: usize,
}

/// Archive reader for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Read every file entry of a ZIP archive into memory, concatenated
    ///
    /// Directory entries are skipped. Encrypted entries, CRC failures, and
    /// archives without any file entry are reported as
    /// [`ExtractionError::ArchiveRead`].
    pub fn read_concatenated(archive_path: &Path) -> Result<ExtractedText, ExtractionError> {
        debug!(?archive_path, "reading ZIP archive");

        let file = std::fs::File::open(archive_path)
            .map_err(|e| archive_error(archive_path, format!("failed to open archive: {}", e)))?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            archive_error(archive_path, format!("failed to read ZIP archive: {}", e))
        })?;

        let mut bytes = Vec::new();
        let mut entries = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| {
                archive_error(archive_path, format!("failed to read ZIP entry {}: {}", i, e))
            })?;

            if entry.is_dir() {
                continue;
            }

            if entry.enclosed_name().is_none() {
                // Only the name is unsafe; the content is still usable.
                warn!(?archive_path, entry = entry.name(), "entry has unsafe path");
            }

            entry.read_to_end(&mut bytes).map_err(|e| {
                archive_error(
                    archive_path,
                    format!("failed to decompress entry {}: {}", entry.name(), e),
                )
            })?;
            entries += 1;
        }

        if entries == 0 {
            return Err(archive_error(
                archive_path,
                "archive contains no file entries".to_string(),
            ));
        }

        debug!(?archive_path, entries, len = bytes.len(), "ZIP archive read");

        Ok(ExtractedText { bytes, entries })
    }
}

fn archive_error(archive: &Path, reason: String) -> ExtractionError {
    ExtractionError::ArchiveRead {
        archive: archive.to_path_buf(),
        reason,
    }
}
