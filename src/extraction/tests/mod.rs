use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::extraction::*;
use crate::tracker::CompletionTracker;
use crate::types::{ArtifactName, ExtractionOutcome, ExtractionRequest, Verification};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing a single file with the given name and content
fn create_zip_archive(archive_path: &Path, file_name: &str, content: &[u8]) {
    create_zip_archive_multi(archive_path, &[(file_name, content)]);
}

/// Create a valid ZIP archive containing multiple files, in the given order
fn create_zip_archive_multi(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a password-encrypted ZIP using the deprecated ZipCrypto method
/// (only encryption method supported for writing by zip 0.6)
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8], password: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(password);
    writer.start_file(file_name, options).unwrap();
    std::io::Write::write_all(&mut writer, content).unwrap();
    writer.finish().unwrap();
}

/// Source and output directories under one temp root
struct Dirs {
    _root: TempDir,
    source: PathBuf,
    output: PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let source = root.path().join("sync");
    let output = root.path().join("logs");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&output).unwrap();
    Dirs {
        _root: root,
        source,
        output,
    }
}

fn request(d: &Dirs, file_name: &str) -> ExtractionRequest {
    ExtractionRequest::new(
        d.source.join(file_name),
        d.source.clone(),
        d.output.clone(),
    )
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// ZipExtractor
// ---------------------------------------------------------------------------

#[test]
fn test_read_single_entry() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("one.zip");
    create_zip_archive(&archive, "one.log", b"hello\n");

    let text = ZipExtractor::read_concatenated(&archive).unwrap();
    assert_eq!(text.bytes, b"hello\n");
    assert_eq!(text.entries, 1);
}

#[test]
fn test_read_concatenates_in_enumeration_order() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("multi.zip");
    create_zip_archive_multi(&archive, &[("b", b"1\n"), ("a", b"2\n")]);

    let text = ZipExtractor::read_concatenated(&archive).unwrap();
    assert_eq!(text.bytes, b"1\n2\n");
    assert_eq!(text.entries, 2);
}

#[test]
fn test_read_skips_directory_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("dirs.zip");
    let file = std::fs::File::create(&archive).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    writer.add_directory("nested/", options).unwrap();
    writer.start_file("nested/x.log", options).unwrap();
    std::io::Write::write_all(&mut writer, b"x").unwrap();
    writer.finish().unwrap();

    let text = ZipExtractor::read_concatenated(&archive).unwrap();
    assert_eq!(text.bytes, b"x");
    assert_eq!(text.entries, 1);
}

#[test]
fn test_read_corrupt_archive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("corrupt.zip");
    std::fs::write(&archive, b"this is not a zip file").unwrap();

    let err = ZipExtractor::read_concatenated(&archive).unwrap_err();
    assert!(err.is_archive_error());
}

#[test]
fn test_read_missing_archive() {
    let temp = TempDir::new().unwrap();
    let err = ZipExtractor::read_concatenated(&temp.path().join("gone.zip")).unwrap_err();
    match err {
        ExtractionError::ArchiveRead { reason, .. } => {
            assert!(reason.contains("failed to open archive"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_read_encrypted_archive_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("secret.zip");
    create_encrypted_zip(&archive, "secret.log", b"classified", b"hunter2");

    let err = ZipExtractor::read_concatenated(&archive).unwrap_err();
    assert!(err.is_archive_error());
}

#[test]
fn test_read_empty_archive_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("empty.zip");
    create_zip_archive_multi(&archive, &[]);

    let err = ZipExtractor::read_concatenated(&archive).unwrap_err();
    assert!(err.to_string().contains("no file entries"));
}

// ---------------------------------------------------------------------------
// ExtractionEngine::consider
// ---------------------------------------------------------------------------

#[test]
fn test_consider_extracts_and_records() {
    let d = dirs();
    create_zip_archive(&d.source.join("app.zip"), "app.log", b"line 1\nline 2\n");

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "app.zip"), &mut tracker);
    match outcome {
        ExtractionOutcome::Extracted {
            output,
            bytes,
            entries,
            verification,
        } => {
            assert_eq!(output, d.output.join("app.txt"));
            assert_eq!(bytes, 14);
            assert_eq!(entries, 1);
            assert_eq!(verification, Verification::Verified);
        }
        other => panic!("expected Extracted, got {other:?}"),
    }

    assert_eq!(
        std::fs::read_to_string(d.output.join("app.txt")).unwrap(),
        "line 1\nline 2\n"
    );
    assert!(tracker.is_known(&d.output, &ArtifactName::from("app")));
    // Only the committed artifact remains; no temp files left behind
    assert_eq!(dir_names(&d.output), vec!["app.txt".to_string()]);
    // Input archive stays where it was
    assert!(d.source.join("app.zip").exists());
}

#[test]
fn test_consider_twice_extracts_once() {
    let d = dirs();
    let archive = d.source.join("dup.zip");
    create_zip_archive(&archive, "dup.log", b"first\n");

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let first = engine.consider(&request(&d, "dup.zip"), &mut tracker);
    assert_eq!(first.label(), "extracted");

    // Re-delivery with different content under the same name
    create_zip_archive(&archive, "dup.log", b"second\n");
    let second = engine.consider(&request(&d, "dup.zip"), &mut tracker);
    assert_eq!(second, ExtractionOutcome::Skipped);

    assert_eq!(
        std::fs::read_to_string(d.output.join("dup.txt")).unwrap(),
        "first\n"
    );
}

#[test]
fn test_consider_multi_entry_concatenation() {
    let d = dirs();
    create_zip_archive_multi(&d.source.join("ab.zip"), &[("a", b"1\n"), ("b", b"2\n")]);

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "ab.zip"), &mut tracker);
    assert!(matches!(
        outcome,
        ExtractionOutcome::Extracted { entries: 2, .. }
    ));
    assert_eq!(
        std::fs::read_to_string(d.output.join("ab.txt")).unwrap(),
        "1\n2\n"
    );
}

#[test]
fn test_consider_ignores_other_extensions() {
    let d = dirs();
    std::fs::write(d.source.join("notes.txt"), "not an archive").unwrap();

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "notes.txt"), &mut tracker);
    assert_eq!(outcome, ExtractionOutcome::Ignored);
    assert!(dir_names(&d.output).is_empty());
    assert!(!tracker.is_known(&d.output, &ArtifactName::from("notes")));
}

#[test]
fn test_consider_ignores_directories_and_missing_files() {
    let d = dirs();
    std::fs::create_dir(d.source.join("folder.zip")).unwrap();

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    assert_eq!(
        engine.consider(&request(&d, "folder.zip"), &mut tracker),
        ExtractionOutcome::Ignored
    );
    assert_eq!(
        engine.consider(&request(&d, "vanished.zip"), &mut tracker),
        ExtractionOutcome::Ignored
    );
}

#[test]
fn test_consider_uppercase_extension() {
    let d = dirs();
    create_zip_archive(&d.source.join("LOUD.ZIP"), "x", b"x");

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "LOUD.ZIP"), &mut tracker);
    assert_eq!(outcome.label(), "extracted");
    assert!(d.output.join("LOUD.txt").exists());
}

#[test]
fn test_consider_skips_known_without_touching_archive() {
    let d = dirs();
    // Corrupt archive, but the artifact is already known, so it is never opened
    std::fs::write(d.source.join("done.zip"), b"garbage").unwrap();

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();
    tracker.record(&d.output, ArtifactName::from("done"));

    assert_eq!(
        engine.consider(&request(&d, "done.zip"), &mut tracker),
        ExtractionOutcome::Skipped
    );
}

#[test]
fn test_failed_extraction_stays_eligible() {
    let d = dirs();
    let archive = d.source.join("retry.zip");
    std::fs::write(&archive, b"truncated upload").unwrap();

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "retry.zip"), &mut tracker);
    assert!(matches!(outcome, ExtractionOutcome::Failed(_)));
    assert!(!tracker.is_known(&d.output, &ArtifactName::from("retry")));
    assert!(dir_names(&d.output).is_empty());
    assert!(archive.exists(), "failed input must be left in place");

    // Valid re-delivery under the same name
    create_zip_archive(&archive, "retry.log", b"ok\n");
    let outcome = engine.consider(&request(&d, "retry.zip"), &mut tracker);
    assert_eq!(outcome.label(), "extracted");
    assert_eq!(
        std::fs::read_to_string(d.output.join("retry.txt")).unwrap(),
        "ok\n"
    );
}

#[test]
fn test_rename_failure_is_not_recorded() {
    let d = dirs();
    create_zip_archive(&d.source.join("blocked.zip"), "b", b"data");
    // A directory squatting on the final name makes the rename fail
    std::fs::create_dir(d.output.join("blocked.txt")).unwrap();
    std::fs::write(d.output.join("blocked.txt").join("keep"), "x").unwrap();

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();

    let outcome = engine.consider(&request(&d, "blocked.zip"), &mut tracker);
    match outcome {
        ExtractionOutcome::Failed(reason) => assert!(reason.contains("rename")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!tracker.is_known(&d.output, &ArtifactName::from("blocked")));
    assert_eq!(dir_names(&d.output), vec!["blocked.txt".to_string()]);
}

#[test]
fn test_verification_can_be_disabled() {
    let d = dirs();
    create_zip_archive(&d.source.join("fast.zip"), "f", b"f");

    let engine = ExtractionEngine::new(ExtractionConfig {
        verify_checksum: false,
        ..Default::default()
    });
    let mut tracker = CompletionTracker::default();

    match engine.consider(&request(&d, "fast.zip"), &mut tracker) {
        ExtractionOutcome::Extracted { verification, .. } => {
            assert_eq!(verification, Verification::Disabled)
        }
        other => panic!("expected Extracted, got {other:?}"),
    }
}

#[test]
fn test_custom_extensions() {
    let d = dirs();
    create_zip_archive(&d.source.join("bundle.jar"), "MANIFEST.MF", b"Manifest-Version: 1.0\n");

    let engine = ExtractionEngine::new(ExtractionConfig {
        archive_extensions: vec!["jar".into()],
        output_extension: "log".into(),
        ..Default::default()
    });
    let mut tracker = engine.completion_tracker();

    let outcome = engine.consider(&request(&d, "bundle.jar"), &mut tracker);
    assert_eq!(outcome.label(), "extracted");
    assert!(d.output.join("bundle.log").exists());

    std::fs::write(d.source.join("plain.zip"), b"").unwrap();
    assert_eq!(
        engine.consider(&request(&d, "plain.zip"), &mut tracker),
        ExtractionOutcome::Ignored
    );
}

#[test]
fn test_restart_with_custom_output_extension_skips_existing() {
    let d = dirs();
    create_zip_archive(&d.source.join("app.zip"), "app.log", b"first\n");

    let engine = ExtractionEngine::new(ExtractionConfig {
        output_extension: "log".into(),
        ..Default::default()
    });
    let mut tracker = engine.completion_tracker();
    assert_eq!(
        engine.consider(&request(&d, "app.zip"), &mut tracker).label(),
        "extracted"
    );

    // A fresh tracker from the same engine recognises what the engine wrote.
    let mut restarted = engine.completion_tracker();
    assert_eq!(restarted.seed(&d.output).unwrap(), 1);
    assert_eq!(
        engine.consider(&request(&d, "app.zip"), &mut restarted),
        ExtractionOutcome::Skipped
    );
}

#[test]
fn test_output_is_never_visible_partially_written() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let d = dirs();
    let content: Vec<u8> = (0..8 * 1024 * 1024u32).map(|i| b'a' + (i % 26) as u8).collect();
    let expected_len = content.len();
    create_zip_archive(&d.source.join("big.zip"), "big.log", &content);

    let output = d.output.join("big.txt");
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let output = output.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut full_reads = 0usize;
            let mut short_reads = Vec::new();
            loop {
                let finished = done.load(Ordering::SeqCst);
                match std::fs::read(&output) {
                    Ok(bytes) if bytes.len() == expected_len => full_reads += 1,
                    Ok(bytes) => short_reads.push(bytes.len()),
                    Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
                }
                if finished {
                    return (full_reads, short_reads);
                }
            }
        })
    };

    let engine = ExtractionEngine::default();
    let mut tracker = CompletionTracker::default();
    let outcome = engine.consider(&request(&d, "big.zip"), &mut tracker);
    done.store(true, Ordering::SeqCst);

    let (full_reads, short_reads) = observer.join().unwrap();
    assert_eq!(outcome.label(), "extracted");
    assert!(short_reads.is_empty(), "saw partial output: {short_reads:?}");
    assert!(full_reads >= 1);
    assert_eq!(std::fs::read(&output).unwrap(), content);
}

// ---------------------------------------------------------------------------
// ExtractionEngine::consider_shared
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_consider_shared_serialises_same_name() {
    let d = dirs();
    create_zip_archive(&d.source.join("race.zip"), "r", b"race\n");

    let engine = ExtractionEngine::default();
    let tracker = CompletionTracker::default().into_shared();

    let (a, b) = tokio::join!(
        engine.consider_shared(request(&d, "race.zip"), &tracker),
        engine.consider_shared(request(&d, "race.zip"), &tracker),
    );

    let mut labels = vec![a.label(), b.label()];
    labels.sort();
    assert_eq!(labels, vec!["extracted", "skipped"]);
    assert_eq!(tracker.lock().await.count(&d.output), 1);
}
