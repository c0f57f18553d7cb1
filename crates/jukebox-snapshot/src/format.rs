//! Jukebox snapshot structures

use serde::{Deserialize, Serialize};

/// Magic bytes for snapshot blobs: "JKBX"
pub const MAGIC: [u8; 4] = [0x4A, 0x4B, 0x42, 0x58];

/// Current format version
pub const VERSION: u16 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 48;

/// Flag bit marking a zstd-compressed payload
pub const FLAG_COMPRESSED: u16 = 0x1;

/// Largest feature dimension a snapshot may declare
pub const MAX_DIMENSION: u32 = 1 << 16;

/// Fixed-size snapshot header (48 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes: "JKBX"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: compressed)
    pub flags: u16,
    /// Size of the encoded metadata section
    pub metadata_size: u64,
    /// Size of the payload (uncompressed)
    pub payload_size: u64,
    /// Compressed payload size (0 if uncompressed)
    pub payload_size_compressed: u64,
    /// Number of stored tracks
    pub num_tracks: u32,
    /// Floats per feature vector
    pub dimension: u32,
    /// CRC-64 of the uncompressed payload
    pub checksum: u64,
}

impl SnapshotHeader {
    pub fn new(metadata_size: u64, payload_size: u64, num_tracks: u32, dimension: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            metadata_size,
            payload_size,
            payload_size_compressed: 0,
            num_tracks,
            dimension,
            checksum: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & FLAG_COMPRESSED) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= FLAG_COMPRESSED;
        } else {
            self.flags &= !FLAG_COMPRESSED;
        }
    }

    /// Bytes occupied by one stored track: id + vector
    pub fn record_size(&self) -> usize {
        record_size(self.dimension as usize)
    }

    /// Payload size implied by `num_tracks` and `dimension`, `None` on overflow
    pub fn expected_payload_size(&self) -> Option<u64> {
        u64::from(self.dimension)
            .checked_mul(4)
            .and_then(|values| values.checked_add(4))
            .and_then(|record| record.checked_mul(u64::from(self.num_tracks)))
    }
}

/// Size of one payload record for a given dimension
pub fn record_size(dimension: usize) -> usize {
    4 + dimension * 4
}

/// Metadata section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Similarity method name (e.g. "timbre")
    pub method: String,
    /// Decoder the jukebox was powered on with
    pub decoder: Option<String>,
    /// Analysis parameters (JSON)
    pub analysis_params: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Version of the library that wrote the snapshot
    pub library_version: String,
    /// Encoded fitted state, `None` for an untrained jukebox
    pub fitted_state: Option<Vec<u8>>,
}

impl SnapshotMetadata {
    pub fn new(method: impl Into<String>, analysis_params: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            decoder: None,
            analysis_params: analysis_params.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            fitted_state: None,
        }
    }
}

/// One stored track: id and feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub id: u32,
    pub vector: Vec<f32>,
}

/// Complete snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub dimension: u32,
    pub tracks: Vec<TrackRecord>,
}

const CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// CRC-64/ECMA-182 of a payload
pub fn checksum(bytes: &[u8]) -> u64 {
    CRC64.checksum(bytes)
}
