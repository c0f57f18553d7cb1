//! Error taxonomy for the jukebox core

use crate::audio::DecoderError;
use crate::jukebox::TrackId;
use jukebox_snapshot::SnapshotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JukeboxError {
    #[error("insufficient audio: got {got} samples, need at least {required}")]
    InsufficientAudio { got: usize, required: usize },

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("jukebox contains no tracks")]
    EmptyStore,

    #[error("track {0} already exists in the jukebox")]
    DuplicateId(TrackId),

    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("jukebox has not been trained")]
    NotTrained,

    #[error("incompatible snapshot version {found} (supported: {expected})")]
    IncompatibleVersion { found: u16, expected: u16 },

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("unknown similarity method: {0}")]
    UnknownMethod(String),

    #[error("unknown decoder: {0}")]
    UnknownDecoder(String),

    #[error("no audio decoder available in this build")]
    NoDecoder,

    #[error("feature vector has {found} values, method {method} expects {expected}")]
    DimensionMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("fitted state does not belong to method {0}")]
    IncompatibleState(String),

    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<SnapshotError> for JukeboxError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::IncompatibleVersion { found, expected } => {
                JukeboxError::IncompatibleVersion { found, expected }
            }
            other => JukeboxError::Snapshot(other.to_string()),
        }
    }
}

pub type JukeboxResult<T> = Result<T, JukeboxError>;
