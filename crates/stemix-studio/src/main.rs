//! Stemix - multi-track stem remixing console
//!
//! Reads commands from stdin, one per line, while a periodic tick drives the
//! transport display and end-of-playback detection and separation results
//! arrive from the background worker.
//!
//! ## Command line flags
//!
//! - `--config <path>`: configuration file (default ~/.config/stemix/config.yaml)
//! - `--no-audio`: run without opening audio devices
//! - `--cache-dir <path>`: override the cache directory
//! - `[FILES]...`: load up to four files into tracks 1-4 at startup

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, Receiver};

use stemix_core::audio::{AudioBackend, CpalBackend, NullBackend, DEFAULT_BUFFER_SIZE};
use stemix_core::config::{default_config_path, ensure_dir, load_config, save_config};
use stemix_core::engine::TrackFleet;
use stemix_core::{TrackId, NUM_TRACKS};
use stemix_studio::config::StudioConfig;
use stemix_studio::console::Command;
use stemix_studio::separation::{SeparationEvent, SeparationService, StemSplitter};
use stemix_studio::session::{Reply, Session};

/// Stem splitting, per-track effects and mixing from the terminal
#[derive(Parser, Debug)]
#[command(name = "stemix", version)]
#[command(about = "Split songs into stems, add effects per track and export the mix")]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without opening audio devices
    #[arg(long)]
    no_audio: bool,

    /// Directory for converted inputs and separated stems
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Audio files to load into tracks 1-4
    files: Vec<PathBuf>,
}

/// One thing the control loop reacts to
enum Input {
    Line(String),
    StdinClosed,
    Separation(SeparationEvent),
    SeparationClosed,
    Tick,
}

fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stemix-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("stemix starting up");

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: StudioConfig = load_config(&config_path);
    if !config_path.exists() {
        if let Err(e) = save_config(&config, &config_path) {
            log::warn!("Could not write default config: {:#}", e);
        }
    }
    if let Some(dir) = args.cache_dir {
        config.cache_dir = Some(dir);
    }

    let cache_dir = config.resolved_cache_dir();
    let cache_dir = ensure_dir(&cache_dir)
        .with_context(|| format!("Failed to create cache directory {:?}", cache_dir))?;
    log::info!("Cache directory: {:?}", cache_dir);

    let backend: Box<dyn AudioBackend> = if args.no_audio || !config.audio.enabled {
        log::info!("Audio output disabled, running headless");
        let period = config.audio.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE) as usize;
        Box::new(NullBackend::clocked(period))
    } else {
        Box::new(CpalBackend::new(config.audio.buffer_size))
    };
    let fleet = TrackFleet::with_tracks(backend, NUM_TRACKS, config.tracks.clamped_volume());

    let splitter = StemSplitter::new(cache_dir, config.separation.clone());
    let (separation, mut separation_events) = match SeparationService::spawn(splitter) {
        Ok((handle, events)) => (Some(handle), events),
        Err(e) => {
            log::warn!("Stem separation unavailable: {}", e);
            (None, channel::never())
        }
    };

    let mut session = Session::new(fleet, separation, config.separation.default_method);

    if args.files.len() > NUM_TRACKS {
        log::warn!("Only the first {} files are loaded", NUM_TRACKS);
    }
    for (i, file) in args.files.iter().take(NUM_TRACKS).enumerate() {
        if let Err(e) = session.import(TrackId(i), file) {
            eprintln!("Could not load {}: {}", file.display(), e);
        }
    }

    let lines = spawn_stdin_reader()?;
    let ticker = channel::tick(config.transport.poll_interval());

    println!("stemix - type 'help' for commands");

    loop {
        let input = crossbeam::select! {
            recv(lines) -> line => match line {
                Ok(line) => Input::Line(line),
                Err(_) => Input::StdinClosed,
            },
            recv(separation_events) -> event => match event {
                Ok(event) => Input::Separation(event),
                Err(_) => Input::SeparationClosed,
            },
            recv(ticker) -> _ => Input::Tick,
        };

        match input {
            Input::Line(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(command) => match session.execute(command) {
                        Ok(Reply::Message(text)) => {
                            if !text.is_empty() {
                                println!("{}", text);
                            }
                        }
                        Ok(Reply::Quit) => break,
                        Err(e) => {
                            log::error!("{}", e);
                            println!("Error: {}", e);
                        }
                    },
                    Err(e) => println!("{}", e),
                }
            }
            Input::StdinClosed => break,
            Input::Separation(event) => {
                if let Some(text) = session.handle_separation_event(event) {
                    println!("{}", text);
                }
            }
            Input::SeparationClosed => {
                log::warn!("Separation service stopped");
                separation_events = channel::never();
            }
            Input::Tick => {
                if let Some(text) = session.tick() {
                    println!("{}", text);
                }
            }
        }
    }

    session.stop();
    log::info!("stemix stopped");
    Ok(())
}
