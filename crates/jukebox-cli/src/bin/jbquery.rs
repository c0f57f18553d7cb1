//! jbquery - Nearest neighbours from a jukebox snapshot
//!
//! Usage:
//!   jbquery <snapshot> --track <id>      # neighbours of a stored track
//!   jbquery <snapshot> --file <audio>    # neighbours of an unseen file

use anyhow::Result;
use clap::Parser;
use jukebox_cli::catalog::Catalog;
use jukebox_cli::init_logging;
use jukebox_cli::output::{neighbor_outputs, print_json, QueryOutput};
use jukebox_core::{Jukebox, JukeboxSettings, TrackId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jbquery")]
#[command(about = "Find the most similar tracks in a jukebox snapshot", long_about = None)]
struct Args {
    /// Snapshot written by jbbuild
    snapshot: PathBuf,

    /// Id of a stored track
    #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
    track: Option<u32>,

    /// Audio file to analyze and compare against the snapshot
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Number of neighbours to return
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Path to configuration file (TOML), used for the excerpt of --file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => JukeboxSettings::load(path)?,
        None => JukeboxSettings::default(),
    };

    init_logging(args.verbose, settings.logging.debug_level);

    run_jbquery(&args, &settings)
}

fn run_jbquery(args: &Args, settings: &JukeboxSettings) -> Result<()> {
    if !args.snapshot.exists() {
        anyhow::bail!("Snapshot not found: {}", args.snapshot.display());
    }

    let jukebox = Jukebox::load(&args.snapshot)?;
    let catalog = Catalog::load(&args.snapshot)?;
    log::info!(
        "Loaded {} tracks ({}) from {}",
        jukebox.track_count(),
        jukebox.method_name(),
        args.snapshot.display()
    );

    let (query, neighbors) = match (&args.file, args.track) {
        (Some(path), _) => {
            let vector = jukebox.analyze_file(
                path,
                settings.excerpt.start_s,
                settings.excerpt.length_s,
            )?;
            (
                path.display().to_string(),
                jukebox.nearest_to_vector(&vector, args.k)?,
            )
        }
        (None, Some(id)) => {
            let id = TrackId(id);
            let label = match catalog.as_ref().and_then(|c| c.path_of(id)) {
                Some(path) => format!("track {} ({})", id, path),
                None => format!("track {}", id),
            };
            (label, jukebox.nearest_neighbors(id, args.k)?)
        }
        (None, None) => anyhow::bail!("Either --track or --file is required"),
    };

    print_json(&QueryOutput {
        snapshot: args.snapshot.display().to_string(),
        method: jukebox.method_name().to_string(),
        query,
        results: neighbor_outputs(&neighbors, catalog.as_ref()),
    });

    Ok(())
}
