//! Terminal front end: live visualization, recording, and replay.

use std::path::PathBuf;
use std::sync::mpsc;

use clap::Parser;

use pulseviz::audio::{self, AudioCaptureHandle};
use pulseviz::driver::{DriverCommand, DriverConfig, SnapshotSource, TickDriver};
use pulseviz::field::FieldConfig;
use pulseviz::session::SessionPlayer;
use pulseviz::style::{Palette, StyleConfig};

#[derive(Parser, Debug)]
#[command(name = "pulseviz", about = "Audio-reactive particle visualizer", version)]
struct Args {
    /// Audio source id (see --list-sources); defaults to the system input
    #[arg(long)]
    source: Option<String>,

    /// Record the session to this file
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,

    /// Replay a recorded session instead of capturing live audio
    #[arg(long, value_name = "FILE", conflicts_with_all = ["source", "record"])]
    replay: Option<PathBuf>,

    /// Playback speed multiplier for --replay
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Color palette: spectrum, ocean, sunset, neon, mono
    #[arg(long, default_value = "spectrum")]
    palette: String,

    /// Tick rate in Hz
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Stop after this many ticks (runs until interrupted by default)
    #[arg(long)]
    ticks: Option<u64>,

    /// List available audio sources and exit
    #[arg(long)]
    list_sources: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.list_sources {
        for source in audio::list_sources()? {
            println!("{}\t{}", source.id, source.name);
        }
        return Ok(());
    }

    let palette = Palette::by_name(&args.palette)
        .ok_or_else(|| format!("unknown palette: {}", args.palette))?;
    let style = StyleConfig {
        palette,
        ..Default::default()
    };

    let mut config = DriverConfig {
        tick_rate_hz: args.tick_rate,
        sample_rate_hz: None,
        field: FieldConfig::default(),
    };

    let source = match &args.replay {
        Some(path) => {
            let mut player = SessionPlayer::load(path)?;
            player.set_speed(args.speed);
            log::info!(
                "replaying \"{}\" by {} ({:.1}s at {}x)",
                player.header().title,
                player.header().user,
                player.duration_s(),
                player.speed()
            );
            SnapshotSource::Playback(player)
        }
        None => {
            let audio_config = audio::AudioConfig::default();
            config.sample_rate_hz = Some(audio_config.sample_rate);
            let capture = AudioCaptureHandle::start(audio_config, args.source.clone())?;
            SnapshotSource::Live(capture)
        }
    };

    let mut driver = TickDriver::new(config, style, source);

    if let Some(path) = &args.record {
        driver.apply(DriverCommand::StartRecording {
            path: path.clone(),
            user: whoami(),
            title: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "session".to_string()),
        });
    }

    // Commands would come from a UI thread; the terminal front end only
    // ever lets the channel hang up on ctrl-c
    let (_command_tx, command_rx) = mpsc::channel::<DriverCommand>();

    let mut last_report = std::time::Instant::now();
    driver.run(command_rx, args.ticks, move |records| {
        if last_report.elapsed().as_secs_f64() >= 1.0 {
            let peak_alpha = records.iter().map(|r| r.alpha).fold(0.0f64, f64::max);
            log::info!("{} particles, peak alpha {peak_alpha:.2}", records.len());
            last_report = std::time::Instant::now();
        }
    });

    Ok(())
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".to_string())
}
