//! jbinfo - Library capabilities and snapshot details
//!
//! Usage: jbinfo [snapshot]

use anyhow::Result;
use clap::Parser;
use jukebox_cli::init_logging;
use jukebox_cli::output::{print_json, SnapshotInfo};
use jukebox_core::runtime::{self, DebugLevel};
use jukebox_core::{available_decoders, available_methods, Jukebox};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jbinfo")]
#[command(about = "Show available methods and decoders, or describe a snapshot", long_about = None)]
struct Args {
    /// Snapshot to describe
    snapshot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Info {
    version: &'static str,
    methods: Vec<&'static str>,
    decoders: Vec<&'static str>,
    debug_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<SnapshotInfo>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, DebugLevel::Quiet);

    let snapshot = match &args.snapshot {
        Some(path) => {
            let jukebox = Jukebox::load(path)?;
            Some(SnapshotInfo::new(&path.display().to_string(), &jukebox))
        }
        None => None,
    };

    print_json(&Info {
        version: runtime::version(),
        methods: available_methods(),
        decoders: available_decoders(),
        debug_level: runtime::settings().debug_level.into(),
        snapshot,
    });

    Ok(())
}
