//! jbbuild - Analyze audio files into a jukebox snapshot
//!
//! Usage: jbbuild <inputs...> -o <snapshot>

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_cli::catalog::Catalog;
use jukebox_cli::output::print_json;
use jukebox_cli::{init_logging, training_sample};
use jukebox_core::audio::is_audio_file;
use jukebox_core::{FeatureVector, Jukebox, JukeboxResult, JukeboxSettings, TrackId};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "jbbuild")]
#[command(about = "Build a music similarity snapshot from audio files", long_about = None)]
struct Args {
    /// Audio files or directories (scanned one level deep)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output snapshot path
    #[arg(short, long)]
    output: PathBuf,

    /// Similarity method (overrides config)
    #[arg(short, long)]
    method: Option<String>,

    /// Audio decoder (overrides config)
    #[arg(short, long)]
    decoder: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Excerpt start in seconds; negative centers the excerpt
    #[arg(long, allow_hyphen_values = true)]
    start: Option<f32>,

    /// Excerpt length in seconds; 0 analyzes whole files
    #[arg(long)]
    length: Option<f32>,

    /// Store vectors without training the method
    #[arg(long)]
    no_train: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct FailedFile {
    path: String,
    error: String,
}

#[derive(Serialize)]
struct BuildSummary {
    status: &'static str,
    output_file: String,
    tracks_file: String,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoder: Option<String>,
    dimension: usize,
    num_tracks: usize,
    num_failed: usize,
    failed: Vec<FailedFile>,
    trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    training_error: Option<String>,
    processing_time_seconds: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => JukeboxSettings::load(path)?,
        None => JukeboxSettings::default(),
    };

    init_logging(args.verbose, settings.logging.debug_level);

    run_jbbuild(&args, &settings)
}

/// Expand directories into their audio files, sorted by path
fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory {}", input.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| is_audio_file(path))
                .collect();
            entries.sort();
            log::info!("{}: {} audio files", input.display(), entries.len());
            files.extend(entries);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            anyhow::bail!("Input not found: {}", input.display());
        }
    }
    Ok(files)
}

fn run_jbbuild(args: &Args, settings: &JukeboxSettings) -> Result<()> {
    let start = std::time::Instant::now();

    let method = args.method.as_deref().or(settings.jukebox.method.as_deref());
    let decoder = args.decoder.as_deref().or(settings.jukebox.decoder.as_deref());
    let excerpt_start = args.start.unwrap_or(settings.excerpt.start_s);
    let excerpt_length = args.length.unwrap_or(settings.excerpt.length_s);

    let mut jukebox = Jukebox::with_config(method, decoder, settings.analysis.clone())?;

    let files = collect_files(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No audio files found");
    }
    log::info!(
        "Analyzing {} files with {} ({:.1}s excerpts starting at {:.1}s)",
        files.len(),
        jukebox.method_name(),
        excerpt_length,
        excerpt_start
    );

    // Analysis runs in parallel; vectors are stored in input order
    let analyzer = jukebox.analyzer().clone();
    let results: Vec<(&Path, JukeboxResult<FeatureVector>)> = files
        .par_iter()
        .map(|path| {
            log::debug!("Analyzing: {}", path.display());
            (
                path.as_path(),
                analyzer.analyze_file(path, excerpt_start, excerpt_length),
            )
        })
        .collect();

    let mut catalog = Catalog::default();
    let mut analyzed = Vec::new();
    let mut failed = Vec::new();
    for (path, result) in results {
        match result {
            Ok(vector) => {
                let id = TrackId(analyzed.len() as u32);
                catalog.insert(id, path);
                analyzed.push((id, vector));
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                failed.push(FailedFile {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    jukebox.add_vectors(analyzed)?;

    let mut training_error = None;
    if !args.no_train && jukebox.track_count() > 0 {
        let sample = training_sample(&jukebox.track_ids(), settings.training.max_tracks);
        if let Err(e) = jukebox.train(Some(sample.as_slice())) {
            log::warn!("Training failed: {}", e);
            training_error = Some(e.to_string());
        }
    }

    jukebox.save(&args.output, settings.snapshot.compress)?;
    let tracks_file = catalog.save(&args.output)?;

    let elapsed = start.elapsed();
    log::info!(
        "Stored {} tracks ({} failed) in {:.2}s",
        jukebox.track_count(),
        failed.len(),
        elapsed.as_secs_f64()
    );

    print_json(&BuildSummary {
        status: "success",
        output_file: args.output.display().to_string(),
        tracks_file: tracks_file.display().to_string(),
        method: jukebox.method_name().to_string(),
        decoder: jukebox.decoder_name().map(str::to_string),
        dimension: jukebox.dimension(),
        num_tracks: jukebox.track_count(),
        num_failed: failed.len(),
        failed,
        trained: jukebox.is_trained(),
        training_error,
        processing_time_seconds: elapsed.as_secs_f64(),
    });

    Ok(())
}
