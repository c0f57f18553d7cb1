//! Track store and similarity queries
//!
//! A [`Jukebox`] owns one similarity method, the feature vectors of its tracks
//! and the state fitted by the last successful [`Jukebox::train`]. It is not
//! internally synchronized: mutate it from one thread, read it from many.
//! Feature extraction is independent of the store and can run in parallel
//! through a cloned [`TrackAnalyzer`].

use crate::audio::{create_decoder, default_decoder, AudioSource};
use crate::config::AnalysisConfig;
use crate::error::{JukeboxError, JukeboxResult};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::method::{create_method, default_method, FittedState, SimilarityMethod};
use jukebox_snapshot::{Snapshot, SnapshotMetadata, SnapshotReader, SnapshotWriter, TrackRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Identifier of a track inside one jukebox
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for TrackId {
    fn from(id: u32) -> Self {
        TrackId(id)
    }
}

/// One entry of a nearest-neighbour ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: TrackId,
    /// Distance to the query; lower is more similar
    pub score: f32,
}

/// Decoder plus extractor, detached from any store
#[derive(Clone)]
pub struct TrackAnalyzer {
    extractor: FeatureExtractor,
    decoder: Option<Arc<dyn AudioSource>>,
}

impl TrackAnalyzer {
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Feature vector of mono PCM at `sample_rate`
    pub fn analyze_pcm(&self, samples: &[f32], sample_rate: u32) -> JukeboxResult<FeatureVector> {
        self.extractor.extract(samples, sample_rate)
    }

    /// Decode an excerpt of `path` and compute its feature vector
    pub fn analyze_file(&self, path: &Path, start: f32, length: f32) -> JukeboxResult<FeatureVector> {
        let decoder = self.decoder.as_ref().ok_or(JukeboxError::NoDecoder)?;
        let samples = decoder.decode(path, start, length)?;
        log::debug!(
            "{}: decoded {} samples with {}",
            path.display(),
            samples.len(),
            decoder.name()
        );
        self.extractor.extract(&samples, decoder.sample_rate())
    }
}

pub struct Jukebox {
    config: AnalysisConfig,
    method: Arc<dyn SimilarityMethod>,
    analyzer: TrackAnalyzer,
    tracks: BTreeMap<TrackId, FeatureVector>,
    state: Option<FittedState>,
}

impl fmt::Debug for Jukebox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jukebox")
            .field("method", &self.method_name())
            .field("decoder", &self.decoder_name())
            .field("tracks", &self.tracks.len())
            .field("trained", &self.is_trained())
            .finish()
    }
}

impl Jukebox {
    /// Create an empty jukebox with the default analysis parameters.
    ///
    /// `None` selects the default method, and the built-in decoder (or the
    /// external one when it is the only decoder compiled in).
    pub fn power_on(method: Option<&str>, decoder: Option<&str>) -> JukeboxResult<Self> {
        Self::with_config(method, decoder, AnalysisConfig::default())
    }

    pub fn with_config(
        method: Option<&str>,
        decoder: Option<&str>,
        config: AnalysisConfig,
    ) -> JukeboxResult<Self> {
        let method_name = match method {
            Some(name) => name,
            None => default_method()
                .ok_or_else(|| JukeboxError::UnknownMethod("no method compiled in".to_string()))?,
        };
        let method = create_method(method_name, &config)?;

        let decoder = match decoder {
            Some(name) => Some(create_decoder(name, config.sample_rate)?),
            None => default_decoder(config.sample_rate),
        };

        let extractor = FeatureExtractor::new(&config, method.clone())?;

        log::info!(
            "Jukebox powered on: method {}, decoder {}, dimension {}",
            method.name(),
            decoder.as_ref().map(|d| d.name()).unwrap_or("none"),
            method.dimension()
        );

        Ok(Self {
            config,
            method,
            analyzer: TrackAnalyzer { extractor, decoder },
            tracks: BTreeMap::new(),
            state: None,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Method name and description
    pub fn method_info(&self) -> String {
        format!("{}: {}", self.method.name(), self.method.about())
    }

    pub fn decoder_name(&self) -> Option<&'static str> {
        self.analyzer.decoder.as_ref().map(|d| d.name())
    }

    pub fn dimension(&self) -> usize {
        self.method.dimension()
    }

    /// Size in bytes of one serialized track
    pub fn track_size(&self) -> usize {
        self.dimension() * std::mem::size_of::<f32>()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn highest_track_id(&self) -> Option<TrackId> {
        self.tracks.keys().next_back().copied()
    }

    /// Stored ids in ascending order
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.keys().copied().collect()
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn fitted_state(&self) -> Option<&FittedState> {
        self.state.as_ref()
    }

    pub fn vector(&self, id: TrackId) -> Option<&FeatureVector> {
        self.tracks.get(&id)
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.analyzer.extractor
    }

    /// Cloneable analyzer for computing vectors outside the store, e.g. on worker threads
    pub fn analyzer(&self) -> &TrackAnalyzer {
        &self.analyzer
    }

    pub fn analyze_pcm(&self, samples: &[f32], sample_rate: u32) -> JukeboxResult<FeatureVector> {
        self.analyzer.analyze_pcm(samples, sample_rate)
    }

    pub fn analyze_file(&self, path: &Path, start: f32, length: f32) -> JukeboxResult<FeatureVector> {
        self.analyzer.analyze_file(path, start, length)
    }

    fn lookup(&self, id: TrackId) -> JukeboxResult<&FeatureVector> {
        self.tracks.get(&id).ok_or_else(|| {
            log::debug!("Unknown track {}", id);
            JukeboxError::UnknownTrack(id)
        })
    }

    fn fitted(&self) -> JukeboxResult<&FittedState> {
        self.state.as_ref().ok_or_else(|| {
            log::debug!("Query before training");
            JukeboxError::NotTrained
        })
    }

    fn check_new_id(&self, id: TrackId) -> JukeboxResult<()> {
        if self.tracks.contains_key(&id) {
            log::warn!("Track {} already exists; not replacing it", id);
            return Err(JukeboxError::DuplicateId(id));
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &FeatureVector) -> JukeboxResult<()> {
        if vector.len() != self.dimension() {
            return Err(JukeboxError::DimensionMismatch {
                method: self.method_name().to_string(),
                expected: self.dimension(),
                found: vector.len(),
            });
        }
        Ok(())
    }

    /// Analyze mono PCM at the analysis sample rate and store it under `id`
    pub fn add_track(&mut self, id: TrackId, samples: &[f32]) -> JukeboxResult<()> {
        self.check_new_id(id)?;
        let vector = self
            .analyze_pcm(samples, self.config.sample_rate)
            .map_err(|e| {
                log::debug!("Track {}: analysis failed: {}", id, e);
                e
            })?;
        self.tracks.insert(id, vector);
        log::debug!("Added track {}", id);
        Ok(())
    }

    /// Store a vector computed elsewhere, e.g. by a cloned [`TrackAnalyzer`]
    pub fn add_vector(&mut self, id: TrackId, vector: FeatureVector) -> JukeboxResult<()> {
        self.check_new_id(id)?;
        self.check_dimension(&vector).map_err(|e| {
            log::warn!("Track {}: {}", id, e);
            e
        })?;
        self.tracks.insert(id, vector);
        log::debug!("Added track {}", id);
        Ok(())
    }

    /// Store several vectors; nothing is added unless every entry is valid
    pub fn add_vectors(&mut self, entries: Vec<(TrackId, FeatureVector)>) -> JukeboxResult<()> {
        let mut batch = BTreeSet::new();
        for (id, vector) in &entries {
            self.check_new_id(*id)?;
            if !batch.insert(*id) {
                log::warn!("Track {} appears twice in one batch", id);
                return Err(JukeboxError::DuplicateId(*id));
            }
            self.check_dimension(vector).map_err(|e| {
                log::warn!("Track {}: {}", id, e);
                e
            })?;
        }
        let count = entries.len();
        self.tracks.extend(entries);
        log::debug!("Added {} tracks", count);
        Ok(())
    }

    /// Decode, analyze and store an excerpt of an audio file
    pub fn add_file(&mut self, id: TrackId, path: &Path, start: f32, length: f32) -> JukeboxResult<()> {
        self.check_new_id(id)?;
        let vector = self.analyze_file(path, start, length).map_err(|e| {
            log::warn!("Track {} ({}): {}", id, path.display(), e);
            e
        })?;
        self.tracks.insert(id, vector);
        log::debug!("Added track {} from {}", id, path.display());
        Ok(())
    }

    /// Replace the vector of an existing track
    pub fn replace_track(&mut self, id: TrackId, vector: FeatureVector) -> JukeboxResult<()> {
        self.lookup(id)?;
        self.check_dimension(&vector).map_err(|e| {
            log::warn!("Track {}: {}", id, e);
            e
        })?;
        self.tracks.insert(id, vector);
        log::debug!("Replaced track {}", id);
        Ok(())
    }

    /// Remove a track; the fitted state is kept as is
    pub fn remove_track(&mut self, id: TrackId) -> JukeboxResult<FeatureVector> {
        let vector = self.tracks.remove(&id).ok_or_else(|| {
            log::debug!("Cannot remove unknown track {}", id);
            JukeboxError::UnknownTrack(id)
        })?;
        log::debug!("Removed track {}", id);
        Ok(vector)
    }

    /// Remove several tracks; nothing is removed unless every id exists
    pub fn remove_tracks(&mut self, ids: &[TrackId]) -> JukeboxResult<()> {
        for &id in ids {
            self.lookup(id)?;
        }
        for id in ids {
            self.tracks.remove(id);
        }
        log::debug!("Removed {} tracks", ids.len());
        Ok(())
    }

    /// Fit the method on `sample` (all tracks when `None`).
    ///
    /// The previous fitted state stays in place if training fails.
    pub fn train(&mut self, sample: Option<&[TrackId]>) -> JukeboxResult<()> {
        if self.tracks.is_empty() {
            log::debug!("Cannot train an empty jukebox");
            return Err(JukeboxError::EmptyStore);
        }

        let vectors: Vec<&FeatureVector> = match sample {
            Some(ids) => ids
                .iter()
                .map(|&id| self.lookup(id))
                .collect::<JukeboxResult<_>>()?,
            None => self.tracks.values().collect(),
        };

        let state = self.method.train(&vectors).map_err(|e| {
            log::warn!("Training {} on {} tracks failed: {}", self.method_name(), vectors.len(), e);
            e
        })?;

        log::info!(
            "Trained {} on {} of {} tracks",
            self.method_name(),
            vectors.len(),
            self.tracks.len()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Distance between two stored tracks
    pub fn similarity(&self, a: TrackId, b: TrackId) -> JukeboxResult<f32> {
        let va = self.lookup(a)?;
        let vb = self.lookup(b)?;
        let state = self.fitted()?;
        self.method.similarity(va, vb, state)
    }

    /// Distances from an external vector to each of `ids`, in order
    pub fn similarity_to(&self, seed: &FeatureVector, ids: &[TrackId]) -> JukeboxResult<Vec<f32>> {
        self.check_dimension(seed)?;
        let state = self.fitted()?;
        ids.iter()
            .map(|&id| {
                let vector = self.lookup(id)?;
                self.method.similarity(seed, vector, state)
            })
            .collect()
    }

    /// The `k` stored tracks closest to `id`, excluding `id` itself
    pub fn nearest_neighbors(&self, id: TrackId, k: usize) -> JukeboxResult<Vec<Neighbor>> {
        let seed = self.lookup(id)?;
        let state = self.fitted()?;
        self.rank(seed, Some(id), k, state)
    }

    /// The `k` stored tracks closest to an external vector
    pub fn nearest_to_vector(&self, seed: &FeatureVector, k: usize) -> JukeboxResult<Vec<Neighbor>> {
        self.check_dimension(seed)?;
        let state = self.fitted()?;
        self.rank(seed, None, k, state)
    }

    fn rank(
        &self,
        seed: &FeatureVector,
        exclude: Option<TrackId>,
        k: usize,
        state: &FittedState,
    ) -> JukeboxResult<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors = self
            .tracks
            .par_iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(&id, vector)| {
                self.method
                    .similarity(seed, vector, state)
                    .map(|score| Neighbor { id, score })
            })
            .collect::<JukeboxResult<Vec<_>>>()?;

        neighbors.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.id.cmp(&b.id)));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Binary form of one track: the vector as little-endian `f32`
    pub fn track_to_bytes(&self, id: TrackId) -> JukeboxResult<Vec<u8>> {
        Ok(self.lookup(id)?.to_le_bytes())
    }

    /// Parse the output of [`Jukebox::track_to_bytes`] for this jukebox's method
    pub fn track_from_bytes(&self, bytes: &[u8]) -> JukeboxResult<FeatureVector> {
        if bytes.len() != self.track_size() {
            return Err(JukeboxError::DimensionMismatch {
                method: self.method_name().to_string(),
                expected: self.dimension(),
                found: bytes.len() / std::mem::size_of::<f32>(),
            });
        }
        FeatureVector::from_le_bytes(bytes)
            .ok_or_else(|| JukeboxError::InvalidAudio("malformed track bytes".to_string()))
    }

    fn to_snapshot(&self) -> JukeboxResult<Snapshot> {
        let params = serde_json::to_string(&self.config)
            .map_err(|e| JukeboxError::Snapshot(format!("analysis parameters: {}", e)))?;

        let mut metadata = SnapshotMetadata::new(self.method_name(), params);
        metadata.decoder = self.decoder_name().map(str::to_string);
        metadata.fitted_state = self
            .state
            .as_ref()
            .map(|state| bincode::serialize(state))
            .transpose()
            .map_err(|e| JukeboxError::Snapshot(format!("fitted state: {}", e)))?;

        let tracks = self
            .tracks
            .iter()
            .map(|(id, vector)| TrackRecord {
                id: id.0,
                vector: vector.as_slice().to_vec(),
            })
            .collect();

        Ok(Snapshot {
            metadata,
            dimension: self.dimension() as u32,
            tracks,
        })
    }

    fn from_snapshot(snapshot: Snapshot) -> JukeboxResult<Self> {
        let metadata = snapshot.metadata;
        let config: AnalysisConfig = serde_json::from_str(&metadata.analysis_params)
            .map_err(|e| JukeboxError::Snapshot(format!("analysis parameters: {}", e)))?;

        let decoder = match metadata.decoder.as_deref() {
            Some(name) if crate::audio::available_decoders().contains(&name) => Some(name),
            Some(name) => {
                log::warn!("Decoder {} is not available, using the default decoder", name);
                None
            }
            None => None,
        };

        let mut jukebox = Self::with_config(Some(metadata.method.as_str()), decoder, config)?;

        if snapshot.dimension as usize != jukebox.dimension() {
            return Err(JukeboxError::DimensionMismatch {
                method: metadata.method,
                expected: jukebox.dimension(),
                found: snapshot.dimension as usize,
            });
        }

        for record in snapshot.tracks {
            let id = TrackId(record.id);
            if jukebox.contains(id) {
                return Err(JukeboxError::Snapshot(format!("duplicate track id {}", id)));
            }
            jukebox.add_vector(id, FeatureVector::new(record.vector))?;
        }

        let state = metadata
            .fitted_state
            .as_deref()
            .map(|bytes| bincode::deserialize::<FittedState>(bytes))
            .transpose()
            .map_err(|e| JukeboxError::Snapshot(format!("fitted state: {}", e)))?;
        if let Some(state) = &state {
            jukebox
                .method
                .check_state(state)
                .map_err(|e| JukeboxError::Snapshot(format!("fitted state: {}", e)))?;
        }
        jukebox.state = state;

        log::info!(
            "Restored {} jukebox with {} tracks ({})",
            jukebox.method_name(),
            jukebox.track_count(),
            if jukebox.is_trained() { "trained" } else { "untrained" }
        );
        Ok(jukebox)
    }

    /// Serialize into the versioned snapshot format
    pub fn to_bytes(&self, compress: bool) -> JukeboxResult<Vec<u8>> {
        let snapshot = self.to_snapshot()?;
        Ok(SnapshotWriter::new().compressed(compress).to_bytes(&snapshot)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> JukeboxResult<Self> {
        Self::from_snapshot(SnapshotReader::from_bytes(bytes)?)
    }

    pub fn save(&self, path: &Path, compress: bool) -> JukeboxResult<()> {
        let snapshot = self.to_snapshot()?;
        SnapshotWriter::new().compressed(compress).write(path, &snapshot)?;
        log::info!("Saved {} tracks to {}", self.track_count(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> JukeboxResult<Self> {
        Self::from_snapshot(SnapshotReader::read(path)?)
    }
}
