//! Snapshot writer

use crate::error::{SnapshotError, SnapshotResult};
use crate::format::{checksum, record_size, Snapshot, SnapshotHeader, MAX_DIMENSION};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// zstd level used for compressed payloads
const COMPRESSION_LEVEL: i32 = 3;

pub struct SnapshotWriter {
    compress: bool,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self { compress: false }
    }

    /// Compress the track payload with zstd
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Write snapshot to a file
    pub fn write(&self, path: &Path, snapshot: &Snapshot) -> SnapshotResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }

    /// Encode snapshot into an in-memory blob
    pub fn to_bytes(&self, snapshot: &Snapshot) -> SnapshotResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, snapshot)?;
        Ok(buffer)
    }

    /// Write snapshot to any sink
    pub fn write_to<W: Write>(&self, writer: &mut W, snapshot: &Snapshot) -> SnapshotResult<()> {
        let metadata = bincode::serialize(&snapshot.metadata)?;
        let payload = self.encode_tracks(snapshot)?;

        let mut header = SnapshotHeader::new(
            metadata.len() as u64,
            payload.len() as u64,
            snapshot.tracks.len() as u32,
            snapshot.dimension,
        );
        header.checksum = checksum(&payload);

        let payload = if self.compress {
            let compressed = zstd::encode_all(&payload[..], COMPRESSION_LEVEL)?;
            header.set_compressed(true);
            header.payload_size_compressed = compressed.len() as u64;
            compressed
        } else {
            payload
        };

        self.write_header(writer, &header)?;
        writer.write_all(&metadata)?;
        writer.write_all(&payload)?;

        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &SnapshotHeader) -> SnapshotResult<()> {
        writer.write_all(&header.magic)?;
        writer.write_all(&header.version.to_le_bytes())?;
        writer.write_all(&header.flags.to_le_bytes())?;
        writer.write_all(&header.metadata_size.to_le_bytes())?;
        writer.write_all(&header.payload_size.to_le_bytes())?;
        writer.write_all(&header.payload_size_compressed.to_le_bytes())?;
        writer.write_all(&header.num_tracks.to_le_bytes())?;
        writer.write_all(&header.dimension.to_le_bytes())?;
        writer.write_all(&header.checksum.to_le_bytes())?;

        Ok(())
    }

    /// Each record: id (u32) followed by `dimension` f32 values
    fn encode_tracks(&self, snapshot: &Snapshot) -> SnapshotResult<Vec<u8>> {
        if snapshot.dimension > MAX_DIMENSION {
            return Err(SnapshotError::Inconsistent(format!(
                "dimension {} exceeds {}",
                snapshot.dimension, MAX_DIMENSION
            )));
        }
        let dimension = snapshot.dimension as usize;
        let mut payload = Vec::with_capacity(snapshot.tracks.len() * record_size(dimension));

        for track in &snapshot.tracks {
            if track.vector.len() != dimension {
                return Err(SnapshotError::Inconsistent(format!(
                    "track {} has {} values, expected {}",
                    track.id,
                    track.vector.len(),
                    dimension
                )));
            }
            payload.extend_from_slice(&track.id.to_le_bytes());
            for value in &track.vector {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }

        Ok(payload)
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}
