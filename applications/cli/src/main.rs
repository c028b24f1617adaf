/// Streamify - stream, filter and transcode tracks from the command line
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use streamify_cli::{parse_source, parse_track, LogStatusSink, SinkEngine, StreamifyConfig};
use streamify_core::{FilterConfig, TrackSource};
use streamify_filters::{
    available_filters, build_transcoder_args, combine_effects, EffectPreset, EffectSelection,
    EqPreset, TranscoderInput,
};
use streamify_pipeline::{extractor::extractor_args, ProcessPipelineFactory};
use streamify_playback::{PlayOptions, PlayerEvent, RepeatMode, SessionManager};
use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_ID: &str = "cli";

#[derive(Parser)]
#[command(name = "streamify")]
#[command(about = "Stream, filter and transcode tracks through yt-dlp and ffmpeg", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./streamify.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play tracks in order, writing encoded audio to a file or stdout
    Play(PlayArgs),
    /// Print the extractor and transcoder commands for a track
    Args(ArgsArgs),
    /// List filters, equalizer presets and effect presets
    Filters {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct PlayArgs {
    /// Track ids, urls or local files
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Initial volume, 0-200
    #[arg(long)]
    volume: Option<u16>,

    /// Start the first track at this offset in milliseconds
    #[arg(long, default_value_t = 0)]
    seek: u64,

    /// Repeat mode: off, track or queue
    #[arg(long, default_value = "off")]
    repeat: RepeatMode,

    /// Shuffle the tracks after the first
    #[arg(long)]
    shuffle: bool,

    #[command(flatten)]
    track: TrackArgs,
}

#[derive(Args)]
struct ArgsArgs {
    /// Track id, url or local file
    input: String,

    /// Offset in milliseconds
    #[arg(long, default_value_t = 0)]
    seek: u64,

    #[command(flatten)]
    track: TrackArgs,
}

#[derive(Args)]
struct TrackArgs {
    /// Force the source instead of detecting it
    #[arg(long, value_parser = parse_source)]
    source: Option<TrackSource>,

    /// Filter as name=value, repeatable (values are JSON when they parse)
    #[arg(short, long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, Value)>,

    /// Equalizer preset
    #[arg(long)]
    preset: Option<String>,

    /// Effect preset as name or name:intensity, repeatable
    #[arg(short, long = "effect", value_parser = parse_effect)]
    effects: Vec<EffectSelection>,
}

fn parse_filter(value: &str) -> Result<(String, Value), String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{value}'"))?;
    let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.trim().to_string(), parsed))
}

fn parse_effect(value: &str) -> Result<EffectSelection, String> {
    EffectSelection::parse(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Audio may go to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = StreamifyConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Play(args) => play(config, args).await?,
        Commands::Args(args) => print_args(&config, &args)?,
        Commands::Filters { json } => print_filters(json)?,
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

async fn play(config: StreamifyConfig, args: PlayArgs) -> anyhow::Result<()> {
    let output: Box<dyn AsyncWrite + Send + Unpin> = match &args.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(SinkEngine::new(output, signal_tx));
    let factory = Arc::new(ProcessPipelineFactory::new(config.pipeline_config()));
    let manager = SessionManager::new(factory, config.player.clone())
        .with_voice_status(Arc::new(LogStatusSink), config.voice_status.clone());

    let player = manager.create(SESSION_ID, engine);
    let _signals = player.attach_signals(signal_rx);
    let mut events = player.subscribe();

    // Filters are recorded while idle and applied to the first build
    for (name, value) in args.track.filters {
        player.set_filter(&name, value).await?;
    }
    if let Some(preset) = &args.track.preset {
        player.set_preset(preset).await?;
    }
    if !args.track.effects.is_empty() {
        player.set_effect_presets(args.track.effects, true).await?;
    }
    player.set_repeat_mode(args.repeat);

    let mut tracks = args
        .inputs
        .iter()
        .map(|input| parse_track(input, args.track.source));
    let first = tracks.next().context("No tracks given")?;
    let queued = player.add_many(tracks.collect(), None);
    if args.shuffle {
        player.shuffle();
    }
    info!(first = %first.title, queued, "Starting playback");

    let options = PlayOptions {
        start_ms: args.seek,
        volume: args.volume,
        ..Default::default()
    };
    player.play(first, options).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(PlayerEvent::TrackStart { track }) => {
                    info!(track = %track.title, source = %track.source, "Now playing");
                }
                Ok(PlayerEvent::TrackError { track, message }) => {
                    warn!(track = ?track.map(|t| t.title), error = %message, "Track failed");
                }
                Ok(PlayerEvent::QueueEnd | PlayerEvent::Destroy)
                | Err(broadcast::error::RecvError::Closed) => break,
                Ok(event) => debug!(event = event.name(), "Player event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Player events lagged");
                }
            }
        }
    }

    manager.destroy_all();
    Ok(())
}

fn print_args(config: &StreamifyConfig, args: &ArgsArgs) -> anyhow::Result<()> {
    let track = parse_track(&args.input, args.track.source);
    let filters = filters_for(&args.track)?;
    let pipeline = config.pipeline_config();

    let input = if track.is_local() {
        TranscoderInput::File {
            path: track
                .local_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(&track.id)),
            seek_ms: args.seek,
        }
    } else {
        let extractor = extractor_args(&track, &track.id, args.seek, &pipeline.extractor);
        println!("{}", command_line(&pipeline.extractor.path, &extractor));
        TranscoderInput::Pipe
    };

    let transcoder = build_transcoder_args(&filters, &pipeline.audio, &input);
    println!("{}", command_line(&pipeline.transcoder.path, &transcoder));
    Ok(())
}

/// The filter set `play` would build the first track with
fn filters_for(args: &TrackArgs) -> anyhow::Result<FilterConfig> {
    let mut user = FilterConfig::default();
    for (name, value) in &args.filters {
        user = user.with_filter(name, value.clone())?;
    }
    if let Some(preset) = &args.preset {
        let preset = EqPreset::from_name(preset)
            .with_context(|| format!("Unknown equalizer preset '{preset}'"))?;
        user.equalizer = None;
        user.preset = Some(preset.name().to_string());
    }

    let effects = combine_effects(&args.effects)?;
    Ok(effects.merged(&user))
}

fn command_line(program: &std::path::Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains([' ', '\'', '"', '[', ']', '*', '?', '&', ';']) {
            line.push('\'');
            line.push_str(&arg.replace('\'', r"'\''"));
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

fn print_filters(json: bool) -> anyhow::Result<()> {
    let filters = available_filters();

    if json {
        let catalogue = serde_json::json!({
            "filters": filters,
            "eqPresets": EqPreset::ALL.iter().map(EqPreset::name).collect::<Vec<_>>(),
            "effectPresets": EffectPreset::ALL
                .iter()
                .map(|p| serde_json::json!({ "name": p.name(), "description": p.description() }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&catalogue)?);
        return Ok(());
    }

    println!("Filters:");
    for info in &filters {
        let range = match (info.min, info.max) {
            (Some(min), Some(max)) => format!(" [{min}..{max}]"),
            _ => String::new(),
        };
        let kind = serde_json::to_value(info.kind)?;
        println!(
            "  {:<12} {:<8}{range}  {}",
            info.name,
            kind.as_str().unwrap_or_default(),
            info.description
        );
    }

    println!("\nEqualizer presets:");
    for preset in EqPreset::ALL {
        println!("  {}", preset.name());
    }

    println!("\nEffect presets:");
    for preset in EffectPreset::ALL {
        println!("  {:<14} {}", preset.name(), preset.description());
    }

    Ok(())
}
