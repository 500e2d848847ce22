//! Post-commit integrity check
//!
//! Detection only: a mismatch is reported, the committed output is never
//! removed or rewritten.

use crate::types::Verification;
use std::path::Path;

/// Hex MD5 digest of a byte slice
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Re-read a committed file and compare it with the bytes that were extracted
pub fn verify_committed(path: &Path, extracted: &[u8]) -> Verification {
    let on_disk = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return Verification::Unverifiable(e.to_string()),
    };

    let expected = md5_hex(extracted);
    let actual = md5_hex(&on_disk);

    if expected == actual {
        Verification::Verified
    } else {
        Verification::Mismatch { expected, actual }
    }
}
