//! Snapshot reader

use crate::error::{SnapshotError, SnapshotResult};
use crate::format::{
    checksum, Snapshot, SnapshotHeader, SnapshotMetadata, TrackRecord, MAGIC, MAX_DIMENSION,
    VERSION,
};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Upper bound for the metadata section; anything larger is a corrupt header
const MAX_METADATA_SIZE: u64 = 64 * 1024 * 1024;

pub struct SnapshotReader;

impl SnapshotReader {
    /// Read snapshot file
    pub fn read(path: &Path) -> SnapshotResult<Snapshot> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Decode an in-memory blob
    pub fn from_bytes(bytes: &[u8]) -> SnapshotResult<Snapshot> {
        let mut cursor = bytes;
        Self::read_from(&mut cursor)
    }

    /// Read snapshot from any source
    pub fn read_from<R: Read>(reader: &mut R) -> SnapshotResult<Snapshot> {
        let header = Self::read_header(reader)?;

        if header.metadata_size > MAX_METADATA_SIZE {
            return Err(SnapshotError::Inconsistent(format!(
                "metadata section of {} bytes",
                header.metadata_size
            )));
        }
        if header.dimension > MAX_DIMENSION {
            return Err(SnapshotError::Inconsistent(format!(
                "dimension {} exceeds {}",
                header.dimension, MAX_DIMENSION
            )));
        }
        if header.expected_payload_size() != Some(header.payload_size) {
            return Err(SnapshotError::Inconsistent(format!(
                "payload of {} bytes cannot hold {} tracks of dimension {}",
                header.payload_size, header.num_tracks, header.dimension
            )));
        }

        let metadata = Self::read_metadata(reader, header.metadata_size)?;
        let payload = Self::read_payload(reader, &header)?;

        let computed = checksum(&payload);
        if computed != header.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            });
        }

        let tracks = Self::decode_tracks(&payload, &header);

        Ok(Snapshot {
            metadata,
            dimension: header.dimension,
            tracks,
        })
    }

    /// Magic and version are validated before anything else is trusted
    fn read_header<R: Read>(reader: &mut R) -> SnapshotResult<SnapshotHeader> {
        let mut magic = [0u8; 4];
        read_exact(reader, &mut magic, "header")?;
        if magic != MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        let version = read_u16(reader)?;
        if version != VERSION {
            return Err(SnapshotError::IncompatibleVersion {
                found: version,
                expected: VERSION,
            });
        }

        let flags = read_u16(reader)?;
        let metadata_size = read_u64(reader)?;
        let payload_size = read_u64(reader)?;
        let payload_size_compressed = read_u64(reader)?;
        let num_tracks = read_u32(reader)?;
        let dimension = read_u32(reader)?;
        let checksum = read_u64(reader)?;

        Ok(SnapshotHeader {
            magic,
            version,
            flags,
            metadata_size,
            payload_size,
            payload_size_compressed,
            num_tracks,
            dimension,
            checksum,
        })
    }

    fn read_metadata<R: Read>(reader: &mut R, size: u64) -> SnapshotResult<SnapshotMetadata> {
        let bytes = read_section(reader, size, "metadata")?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn read_payload<R: Read>(reader: &mut R, header: &SnapshotHeader) -> SnapshotResult<Vec<u8>> {
        if !header.is_compressed() {
            return read_section(reader, header.payload_size, "payload");
        }

        let compressed = read_section(reader, header.payload_size_compressed, "payload")?;
        // One byte past the declared size is enough to detect an oversized stream
        let mut payload = Vec::new();
        zstd::stream::read::Decoder::new(&compressed[..])?
            .take(header.payload_size.saturating_add(1))
            .read_to_end(&mut payload)?;
        if payload.len() as u64 != header.payload_size {
            return Err(SnapshotError::Inconsistent(format!(
                "payload decompressed to {} bytes, header says {}",
                payload.len(),
                header.payload_size
            )));
        }
        Ok(payload)
    }

    fn decode_tracks(payload: &[u8], header: &SnapshotHeader) -> Vec<TrackRecord> {
        payload
            .chunks_exact(header.record_size())
            .map(|record| {
                let id = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
                let vector = record[4..]
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                TrackRecord { id, vector }
            })
            .collect()
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], section: &str) -> SnapshotResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SnapshotError::Truncated(format!("unexpected end of data in {}", section))
        } else {
            SnapshotError::Io(e)
        }
    })
}

/// Read exactly `size` bytes, growing the buffer only as data arrives
fn read_section<R: Read>(reader: &mut R, size: u64, section: &str) -> SnapshotResult<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.by_ref().take(size).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < size {
        return Err(SnapshotError::Truncated(format!(
            "{} has {} of {} bytes",
            section,
            bytes.len(),
            size
        )));
    }
    Ok(bytes)
}

fn read_u16<R: Read>(reader: &mut R) -> SnapshotResult<u16> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf, "header")?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> SnapshotResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, "header")?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> SnapshotResult<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf, "header")?;
    Ok(u64::from_le_bytes(buf))
}
