//! Snapshot errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("not a jukebox snapshot: magic bytes mismatch")]
    BadMagic,

    #[error("incompatible snapshot version {found} (supported: {expected})")]
    IncompatibleVersion { found: u16, expected: u16 },

    #[error("snapshot checksum mismatch (stored {stored:#018x}, computed {computed:#018x})")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("snapshot truncated: {0}")]
    Truncated(String),

    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),

    #[error("metadata encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
