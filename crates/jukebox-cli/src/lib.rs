//! Shared plumbing for the jukebox command line tools

pub mod catalog;
pub mod output;

use jukebox_core::runtime::{self, DebugLevel, RuntimeSettings};
use jukebox_core::TrackId;

/// Configure `env_logger` and the process-wide debug level.
///
/// Logging stays off unless `-v` is given or the config asks for it, so
/// stdout carries nothing but JSON.
pub fn init_logging(verbose: bool, configured: DebugLevel) {
    let level = if verbose {
        configured.max(DebugLevel::Info)
    } else {
        configured
    };

    env_logger::Builder::from_default_env()
        .filter_level(level.to_level_filter())
        .init();

    if runtime::init(RuntimeSettings { debug_level: level }).is_err() {
        log::debug!("Runtime settings already initialised");
    }
}

/// At most `max` ids spread evenly over `ids`, first one included
pub fn training_sample(ids: &[TrackId], max: usize) -> Vec<TrackId> {
    if ids.len() <= max {
        return ids.to_vec();
    }
    (0..max).map(|i| ids[i * ids.len() / max]).collect()
}
