//! Process-wide runtime settings
//!
//! Library version and debug level live here rather than on a jukebox. They
//! are initialised once at startup and are read-only afterwards.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

static SETTINGS: OnceLock<RuntimeSettings> = OnceLock::new();

/// Debug verbosity, 0 (quiet) to 5 (trace)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DebugLevel {
    #[default]
    Quiet = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl DebugLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            DebugLevel::Quiet => log::LevelFilter::Off,
            DebugLevel::Error => log::LevelFilter::Error,
            DebugLevel::Warning => log::LevelFilter::Warn,
            DebugLevel::Info => log::LevelFilter::Info,
            DebugLevel::Debug => log::LevelFilter::Debug,
            DebugLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl TryFrom<u8> for DebugLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, String> {
        match level {
            0 => Ok(DebugLevel::Quiet),
            1 => Ok(DebugLevel::Error),
            2 => Ok(DebugLevel::Warning),
            3 => Ok(DebugLevel::Info),
            4 => Ok(DebugLevel::Debug),
            5 => Ok(DebugLevel::Trace),
            other => Err(format!("debug level must be in 0..=5 (got {})", other)),
        }
    }
}

impl From<DebugLevel> for u8 {
    fn from(level: DebugLevel) -> Self {
        level as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub debug_level: DebugLevel,
}

#[derive(Debug, Error)]
#[error("runtime settings were already initialised")]
pub struct AlreadyInitialized;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Install the process-wide settings; only the first call succeeds
pub fn init(settings: RuntimeSettings) -> Result<&'static RuntimeSettings, AlreadyInitialized> {
    let level = settings.debug_level;
    SETTINGS.set(settings).map_err(|_| AlreadyInitialized)?;
    log::set_max_level(level.to_level_filter());
    Ok(settings_ref())
}

/// Current settings (defaults if `init` was never called)
pub fn settings() -> &'static RuntimeSettings {
    settings_ref()
}

fn settings_ref() -> &'static RuntimeSettings {
    SETTINGS.get_or_init(RuntimeSettings::default)
}
