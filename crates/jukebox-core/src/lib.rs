//! Jukebox Core - Music Similarity Library
//!
//! Extracts fixed-length timbre feature vectors from audio, keeps them in a
//! track store and answers similarity and nearest-neighbour queries under a
//! pluggable similarity method.
//!
//! ```no_run
//! use jukebox_core::{Jukebox, TrackId};
//! use std::path::Path;
//!
//! # fn main() -> jukebox_core::JukeboxResult<()> {
//! let mut jukebox = Jukebox::power_on(Some("mandelellis"), None)?;
//! jukebox.add_file(TrackId(0), Path::new("a.flac"), -48.0, 30.0)?;
//! jukebox.add_file(TrackId(1), Path::new("b.mp3"), -48.0, 30.0)?;
//! jukebox.add_file(TrackId(2), Path::new("c.ogg"), -48.0, 30.0)?;
//! jukebox.train(None)?;
//! for neighbor in jukebox.nearest_neighbors(TrackId(0), 2)? {
//!     println!("{} {}", neighbor.id, neighbor.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod jukebox;
pub mod method;
pub mod runtime;
pub mod settings;
pub mod transform;

pub use audio::{available_decoders, create_decoder, AudioSource, DecoderError};
pub use config::{AnalysisConfig, DEFAULT_EXCERPT_LENGTH, DEFAULT_EXCERPT_START};
pub use error::{JukeboxError, JukeboxResult};
pub use features::{FeatureExtractor, FeatureVector};
pub use jukebox::{Jukebox, Neighbor, TrackAnalyzer, TrackId};
pub use method::{available_methods, create_method, FittedState, SimilarityMethod, DEFAULT_METHOD};
pub use runtime::{DebugLevel, RuntimeSettings};
pub use settings::JukeboxSettings;
