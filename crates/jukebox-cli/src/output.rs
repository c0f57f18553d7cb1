//! JSON output formatting

use crate::catalog::Catalog;
use jukebox_core::{Jukebox, Neighbor};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NeighborOutput {
    pub id: u32,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub snapshot: String,
    pub method: String,
    /// Track id or file the neighbours were computed for
    pub query: String,
    pub results: Vec<NeighborOutput>,
}

/// Description of a loaded snapshot
#[derive(Debug, Serialize)]
pub struct SnapshotInfo {
    pub path: String,
    pub method: String,
    pub method_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder: Option<String>,
    pub dimension: usize,
    pub track_size: usize,
    pub num_tracks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_track_id: Option<u32>,
    pub trained: bool,
}

impl SnapshotInfo {
    pub fn new(path: &str, jukebox: &Jukebox) -> Self {
        Self {
            path: path.to_string(),
            method: jukebox.method_name().to_string(),
            method_info: jukebox.method_info(),
            decoder: jukebox.decoder_name().map(str::to_string),
            dimension: jukebox.dimension(),
            track_size: jukebox.track_size(),
            num_tracks: jukebox.track_count(),
            highest_track_id: jukebox.highest_track_id().map(|id| id.0),
            trained: jukebox.is_trained(),
        }
    }
}

/// Attach catalog paths to a ranking
pub fn neighbor_outputs(neighbors: &[Neighbor], catalog: Option<&Catalog>) -> Vec<NeighborOutput> {
    neighbors
        .iter()
        .map(|n| NeighborOutput {
            id: n.id.0,
            score: n.score,
            path: catalog.and_then(|c| c.path_of(n.id)).map(str::to_string),
        })
        .collect()
}

/// Print any serializable value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing result: {}", e),
    }
}
