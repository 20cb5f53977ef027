//! Binary entrypoint for the video screensaver.
//!
//! Delegates all logic to the library crate.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use video_screensaver::config::Configuration;
use video_screensaver::events::Mode;
use video_screensaver::playlist::{VideoPlaylist, simulate_picks};
use video_screensaver::preferences::YamlPreferenceStore;
use video_screensaver::tasks::screensaver;

#[derive(Debug, Parser)]
#[command(
    name = "video-screensaver",
    version,
    about = "Fullscreen screensaver cycling through configured videos"
)]
struct Args {
    /// Path to YAML config (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Preferences file holding the video list and volume (overrides the config)
    #[arg(long, value_name = "FILE")]
    preferences: Option<PathBuf>,
    /// Run as a preview: one window that input never closes
    #[arg(long)]
    preview: bool,
    /// Deterministic RNG seed for video selection
    #[arg(long = "playlist-seed", value_name = "SEED")]
    playlist_seed: Option<u64>,
    /// Print the next N picks without opening any window
    #[arg(long = "playlist-dry-run", value_name = "ITERATIONS")]
    playlist_dry_run: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("video_screensaver={level}").parse()?)
        .add_directive("winit=warn".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        preferences,
        preview,
        playlist_seed,
        playlist_dry_run,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = match &config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(path) = preferences {
        cfg.preferences_path = path;
    }
    if playlist_seed.is_some() {
        cfg.playlist_seed = playlist_seed;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!("Loaded configuration:\n{:#?}", cfg);

    if let Some(iterations) = playlist_dry_run {
        return run_playlist_dry_run(&cfg, iterations);
    }

    let mode = if preview {
        Mode::Preview
    } else {
        Mode::FullScreen
    };
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Runs on the main thread; returns when the screensaver ends
    if let Err(e) = screensaver::run_windowed(cfg, mode, cancel.clone(), &mut tasks) {
        tracing::error!("{e:?}");
    }
    // Ensure every player is asked to stop
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn run_playlist_dry_run(cfg: &Configuration, iterations: usize) -> Result<()> {
    let mut store = YamlPreferenceStore::new(cfg.preferences_path.clone());
    let playlist = VideoPlaylist::load(&mut store)
        .with_context(|| format!("failed to read {}", store.path().display()))?;

    println!(
        "# playlist dry run\n# videos: {}\n# iterations: {}\n# seed: {}\n",
        playlist.len(),
        iterations,
        cfg.playlist_seed
            .map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );

    if playlist.is_empty() {
        println!(
            "(no videos configured in {})",
            cfg.preferences_path.display()
        );
        return Ok(());
    }

    for (idx, pick) in simulate_picks(&playlist, iterations, cfg.playlist_seed)
        .into_iter()
        .enumerate()
    {
        println!("  {:>4}: {}", idx + 1, playlist.items()[pick]);
    }
    Ok(())
}
