use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use zone_music::audio_system::OutputChannel;
use zone_music::{
    AppResult, ClipLibrary, CueSheet, EventBus, MusicController, MusicCue, MusicPlayer,
    PlayerConfig, RodioOutput, SilentChannel, TimelineAction,
};

/// Replays a cue sheet's zone enters and exits through the music player
#[derive(Parser, Debug)]
#[command(name = "zone-music", version, about)]
struct Args {
    /// Cue sheet (JSON) with cue definitions and a timeline
    #[arg(long)]
    cues: PathBuf,

    /// Player config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick length in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Keep playing this many seconds after the last timeline event
    #[arg(long, default_value_t = 0.0)]
    hold_secs: f32,

    /// Do not open an audio device
    #[arg(long)]
    silent: bool,

    /// Run ticks back to back instead of in real time
    #[arg(long)]
    fast: bool,
}

fn main() -> AppResult<()> {
    let args = Args::parse();
    initialize_tracing();

    let config_path = args.config.clone().unwrap_or_else(PlayerConfig::default_path);
    let config = PlayerConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let sheet = CueSheet::load(&args.cues)
        .with_context(|| format!("loading cue sheet {}", args.cues.display()))?;
    tracing::info!(
        "Cue sheet: {} cues, {} timeline events",
        sheet.cues.len(),
        sheet.timeline.len()
    );

    let library = ClipLibrary::new();
    let base_dir = args.cues.parent().unwrap_or_else(|| Path::new("."));
    preload_clips(&library, &sheet, base_dir);

    // The output stream must stay alive as long as the channels
    let output = if args.silent {
        None
    } else {
        match RodioOutput::try_default(library.clone()) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("No audio output ({}), running silent", e);
                None
            }
        }
    };
    let channels: Vec<Box<dyn OutputChannel>> = match &output {
        Some(output) => output.channels(2).context("creating output channels")?,
        None => SilentChannel::pair().0,
    };

    let bus = EventBus::new();
    let (events, _subscriber) = bus.subscribe();
    let mut player = MusicPlayer::new(channels, &config).with_events(bus);

    let cues: HashMap<String, Arc<dyn MusicController>> = sheet
        .cues
        .iter()
        .map(|definition| {
            let cue: Arc<dyn MusicController> =
                Arc::new(MusicCue::from_definition(definition, &config));
            (definition.name.clone(), cue)
        })
        .collect();

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let tick_secs = tick.as_secs_f32();
    let end_secs = sheet.duration_secs() + args.hold_secs.max(0.0);
    let mut elapsed = 0.0_f32;
    let mut next_event = 0;

    loop {
        while let Some(event) = sheet.timeline.get(next_event) {
            if event.at_secs > elapsed {
                break;
            }
            apply(&mut player, &cues, &event.action);
            next_event += 1;
        }

        player.advance(tick_secs);
        for event in events.try_iter() {
            tracing::info!(at = elapsed, event = event.label(), "{:?}", event);
        }

        let timeline_done = next_event >= sheet.timeline.len();
        if timeline_done && elapsed >= end_secs && !player.engine().is_transitioning() {
            break;
        }

        if !args.fast {
            thread::sleep(tick);
        }
        elapsed += tick_secs;
    }

    tracing::info!(
        "Timeline finished after {:.2}s; active controller: {}",
        elapsed,
        player.active_name().unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}

/// Load every clip a cue references, relative to the cue sheet
fn preload_clips(library: &ClipLibrary, sheet: &CueSheet, base_dir: &Path) {
    for clip in sheet.cues.iter().flat_map(|cue| cue.clips.iter()) {
        if library.contains(clip) {
            continue;
        }
        let path = base_dir.join(clip.id());
        if let Err(e) = library.load_as(clip.clone(), &path) {
            tracing::warn!("Clip {} unavailable: {}", clip, e);
        }
    }
}

fn apply(
    player: &mut MusicPlayer,
    cues: &HashMap<String, Arc<dyn MusicController>>,
    action: &TimelineAction,
) {
    match action {
        TimelineAction::Enter { cue } => {
            if let Some(controller) = cues.get(cue) {
                tracing::info!("Entered zone {}", cue);
                player.register(controller);
            }
        }
        TimelineAction::Exit { cue } => {
            if let Some(controller) = cues.get(cue) {
                tracing::info!("Left zone {}", cue);
                player.unregister(controller);
            }
        }
        TimelineAction::Volume { volume } => player.set_volume(*volume),
    }
}

/// Initialize tracing with console output and daily rotating log files.
///
/// Logs are written to `<config dir>/zone-music/logs/zone-music.YYYY-MM-DD`.
/// `RUST_LOG` overrides the default `info` filter.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("zone-music").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "zone-music.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!("Log directory: {}", log_dir.display());
}
