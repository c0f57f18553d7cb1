//! Jukebox snapshot file format library

pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use error::{SnapshotError, SnapshotResult};
pub use format::{
    Snapshot, SnapshotHeader, SnapshotMetadata, TrackRecord, HEADER_SIZE, MAGIC, MAX_DIMENSION,
    VERSION,
};
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;
