use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `zwz` crate.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    /// The deflate or inflate codec failed on a chunk. On the compression
    /// side this aborts the whole process.
    #[error("codec failure on '{path}' chunk {sequence_id}: {source}")]
    Codec {
        path: String,
        sequence_id: u32,
        source: std::io::Error,
    },

    /// An archive violated the record framing rules.
    #[error("malformed archive '{}': {detail}", archive.display())]
    Format { archive: PathBuf, detail: String },

    /// The size-sorted file manifest could not be parsed.
    #[error("bad manifest line {line}: {detail}")]
    Manifest { line: usize, detail: String },

    /// Invalid rank / process-count combination.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The pipeline was torn down after a fatal error in another worker.
    #[error("pipeline aborted")]
    Aborted,
}

impl ArchiverError {
    /// Attach a path to a bare `io::Error`.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ArchiverError::Io {
            source,
            path: path.into(),
        }
    }
}
