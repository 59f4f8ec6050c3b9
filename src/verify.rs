//! Whole-file digesting and the post-reconstruction integrity gate.
//!
//! Every file carries one MD5 digest, computed over its full uncompressed
//! content and stored hex-encoded on its last chunk's record. After a file
//! is reassembled the gate recomputes the digest; a mismatch moves the file
//! into a `bad/` directory beside it instead of deleting it.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{error, info};
use md5::{Digest, Md5};

use crate::error::ArchiverError;

const HASH_BUF_SIZE: usize = 8 * 1024;

/// Outcome of the integrity gate for one reconstructed file.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch { quarantined: PathBuf },
}

/// Hex-encoded MD5 of a file's full content.
pub fn md5_hex(path: &Path) -> Result<String, ArchiverError> {
    let mut file = File::open(path).map_err(|e| ArchiverError::io(e, path))?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| ArchiverError::io(e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded MD5 of an in-memory buffer.
pub fn md5_hex_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Compare the reconstructed file at `path` against the digest stored in the
/// archive. On mismatch the file is moved to quarantine and the new location
/// is reported; the mismatch never aborts the surrounding batch.
pub fn verify_file(path: &Path, stored_digest: &str) -> Result<Verification, ArchiverError> {
    let actual = md5_hex(path)?;
    if actual == stored_digest {
        return Ok(Verification::Match);
    }
    error!(
        "digest mismatch for {}: stored {}, computed {}",
        path.display(),
        stored_digest,
        actual
    );
    let quarantined = quarantine(path)?;
    info!(
        "bad file {} moved to {}",
        path.display(),
        quarantined.display()
    );
    Ok(Verification::Mismatch { quarantined })
}

/// Move `path` into a `bad/` subdirectory beside its intended location,
/// creating the directory on demand.
fn quarantine(path: &Path) -> Result<PathBuf, ArchiverError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let bad_dir = parent.join("bad");
    fs::create_dir_all(&bad_dir).map_err(|e| ArchiverError::io(e, &bad_dir))?;
    let dest = bad_dir.join(path.file_name().unwrap_or_default());
    fs::rename(path, &dest).map_err(|e| ArchiverError::io(e, path))?;
    Ok(dest)
}
