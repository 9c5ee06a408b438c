/// Cadence - terminal player
use anyhow::Context;
use cadence_audio_desktop::{CpalOutputDevice, DesktopAudioSource};
use cadence_core::{PlaylistKind, PlaylistRef};
use cadence_playback::{
    event_channel, Collaborators, CooldownAdPolicy, PlaybackConfig, PlaybackController,
    PlayerEvent,
};
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

mod commands;
mod library;

use commands::{Command, HELP};
use library::{ad_for, track_for, SessionLibrary};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence terminal player", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./cadence.toml when present)
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play files or URLs as a queue, controlled from stdin
    Play {
        /// Track locators (paths, file:// or http(s):// URLs)
        #[arg(required = true)]
        locators: Vec<String>,

        /// Ad locators inserted between songs
        #[arg(long = "ad")]
        ads: Vec<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            locators,
            ads,
            json,
        } => play(cli.config, &locators, &ads, json),
    }
}

fn play(
    config_path: Option<PathBuf>,
    locators: &[String],
    ads: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let config = PlaybackConfig::load(config_path.as_deref()).context("loading configuration")?;

    let queue = PlaylistRef::new("queue", "Queue", PlaylistKind::Queue)
        .with_tracks(locators.iter().map(|l| track_for(l)).collect());
    let catalog = ads.iter().map(|l| ad_for(l)).collect();

    let (events, receiver) = event_channel();
    let printer = thread::Builder::new()
        .name("cadence-events".into())
        .spawn(move || print_events(&receiver, json))
        .context("spawning event printer")?;

    let controller = PlaybackController::new(
        config.clone(),
        Collaborators {
            source: Arc::new(DesktopAudioSource::new()?),
            device: Arc::new(CpalOutputDevice::new()),
            ads: Arc::new(CooldownAdPolicy::new(&config.ads, catalog)),
            library: Arc::new(SessionLibrary::new(vec![queue.clone()])),
            events: Arc::new(events),
        },
    )?;

    tracing::info!(tracks = queue.len(), ads = ads.len(), "Starting playback");
    if let Err(err) = controller.play_playlist(queue, 0) {
        tracing::error!(error = %err, "Could not start playback");
    }

    println!("{HELP}");
    run_prompt(&controller)?;

    drop(controller);
    // The printer exits once every sender is gone
    if printer.join().is_err() {
        tracing::error!("Event printer panicked");
    }
    Ok(())
}

fn run_prompt(controller: &PlaybackController) -> anyhow::Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err} (type 'help')");
                continue;
            }
        };

        let result = match command {
            Command::Play => controller.play(),
            Command::Pause => {
                controller.pause();
                Ok(())
            }
            Command::Stop => {
                controller.stop();
                Ok(())
            }
            Command::Next => controller.next(),
            Command::Prev => controller.prev(),
            Command::Shuffle => controller.shuffle(),
            Command::Back => controller.replay_five_seconds(),
            Command::Repeat => {
                println!("repeat: {:?}", controller.cycle_repeat_mode());
                Ok(())
            }
            Command::Volume(db) => {
                println!("gain: {:+.1} dB", controller.set_volume(db));
                Ok(())
            }
            Command::Seek(position) => controller.seek(position),
            Command::Status => {
                print_status(controller);
                Ok(())
            }
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Quit => break,
        };

        if let Err(err) = result {
            eprintln!("error: {err}");
        }
    }

    controller.stop();
    Ok(())
}

fn print_status(controller: &PlaybackController) {
    let state = controller.snapshot();
    let position = controller.position();
    let title = state
        .current_track
        .as_ref()
        .map_or("(nothing)", |t| t.title.as_str());

    println!(
        "{title} [{}] {} / {} | repeat {:?} | {:+.1} dB{}{}",
        state.current_index,
        format_ms(position.time_ms),
        format_ms(state.current_track.as_ref().map_or(0, |t| t.duration_ms())),
        state.repeat_mode,
        state.volume_gain_db,
        if state.is_paused { " | paused" } else { "" },
        if state.having_ad { " | ad" } else { "" },
    );
}

fn print_events(receiver: &Receiver<PlayerEvent>, json: bool) {
    let mut last_second = None;
    for event in receiver {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "Unserializable event"),
            }
            continue;
        }

        match event {
            // Once per second is plenty for a terminal
            PlayerEvent::Progress { time_ms, .. } => {
                let second = time_ms / 1000;
                if last_second != Some(second) {
                    last_second = Some(second);
                    print!("\r  {}   ", format_ms(time_ms));
                    let _ = io::stdout().flush();
                }
            }
            PlayerEvent::SongLoaded(track) => {
                last_second = None;
                let kind = if track.is_advertisement { "ad" } else { "now playing" };
                println!("\n{kind}: {}", track.title);
            }
            PlayerEvent::LoadFailed { reason } => println!("\nfailed: {reason}"),
            PlayerEvent::PlaybackPaused => println!("\npaused"),
            PlayerEvent::PlaybackStarted => println!("playing"),
            PlayerEvent::VolumeChanged(_) | PlayerEvent::VisualizerToggled(_) => {}
            other => println!("{other:?}"),
        }
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
