//! chordsmith: generate, play out and export diatonic chord progressions

use std::path::PathBuf;

use anyhow::Context;
use chordsmith_core::theory::KEY_NAMES;
use chordsmith_core::{
    ChordQuality, GeneratorSettings, MidiEvent, MidiMessage, PlaybackState, ProgressionPreset,
    ScaleType, note_name, notes_to_string, parse_key,
};
use chordsmith_services::{AppConfig, ChordProcessor, config, load_config};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chordsmith")]
#[command(about = "Diatonic chord progression generator", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for humanization
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Key, e.g. C, F#, Bb
    #[arg(short, long, global = true, value_parser = parse_key)]
    key: Option<u8>,

    #[arg(long, global = true)]
    scale: Option<ScaleType>,

    /// Preset name, e.g. ii-V-I, or Custom
    #[arg(long, global = true)]
    preset: Option<ProgressionPreset>,

    /// Degree string, implies the Custom preset
    #[arg(long, global = true)]
    progression: Option<String>,

    #[arg(long, global = true)]
    quality: Option<ChordQuality>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved progression and its chords
    Show,

    /// Play the progression through the block processor and print each event
    Play {
        /// Samples per block
        #[arg(short, long)]
        block_size: Option<u32>,

        /// Feed a note-on every N blocks to exercise live triggering
        #[arg(long)]
        trigger_every: Option<u32>,
    },

    /// Write the progression to a Standard MIDI File
    Export {
        /// Output path
        out: PathBuf,

        /// Tempo used to convert milliseconds to ticks
        #[arg(long)]
        bpm: Option<f64>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chordsmith=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut app = load_config(cli.config.as_deref()).context("loading configuration")?;
    apply_overrides(&cli, &mut app);

    match cli.command {
        Commands::Show => show(&app.settings),
        Commands::Play { block_size, trigger_every } => {
            let block_size = block_size.unwrap_or(app.engine.block_size).max(1);
            play(&app, block_size, trigger_every);
        }
        Commands::Export { out, bpm } => {
            let bpm = bpm.unwrap_or(app.engine.export_bpm);
            let processor = ChordProcessor::new(app.engine.sample_rate, app.settings.clone(), app.engine.seed);
            let shared = processor.shared();
            shared.request_export();
            if let Some(result) = shared.export_if_requested(&out, bpm) {
                result.with_context(|| format!("exporting to {}", out.display()))?;
            }
            println!("Wrote {}", out.display());
        }
        Commands::Config => print!("{}", config::to_toml(&app)?),
    }

    Ok(())
}

fn apply_overrides(cli: &Cli, app: &mut AppConfig) {
    let s = &mut app.settings;
    if let Some(key) = cli.key {
        s.key = key;
    }
    if let Some(scale) = cli.scale {
        s.scale = scale;
    }
    if let Some(preset) = cli.preset {
        s.preset = preset;
    }
    if let Some(progression) = &cli.progression {
        s.preset = ProgressionPreset::Custom;
        s.custom_progression = progression.clone();
    }
    if let Some(quality) = cli.quality {
        s.quality = quality;
    }
    if cli.seed.is_some() {
        app.engine.seed = cli.seed;
    }
    *s = s.sanitized();
}

fn show(settings: &GeneratorSettings) {
    let key = KEY_NAMES[(settings.key % 12) as usize];
    println!("{key} {} {}", settings.scale, settings.roman_label());
    for (degree, chord) in settings.degrees().into_iter().zip(settings.chords()) {
        println!("  {degree}: {}", notes_to_string(&chord));
    }
}

fn play(app: &AppConfig, block_size: u32, trigger_every: Option<u32>) {
    let mut processor = ChordProcessor::new(app.engine.sample_rate, app.settings.clone(), app.engine.seed);
    let shared = processor.shared();
    shared.request_generate();

    let mut block = 0u32;
    loop {
        let exhausted = processor.playback_state() == PlaybackState::Exhausted;
        let incoming = match trigger_every {
            Some(n) if n > 0 && block % n == 0 && !exhausted => vec![MidiEvent::note_on(1, 60, 100, 0)],
            _ => Vec::new(),
        };
        let start = block as u64 * block_size as u64;
        for event in processor.process_block(&incoming, block_size) {
            println!("{:>9}  ch{}  {}", start + event.sample_offset as u64, event.channel, describe(&event.message));
        }
        block += 1;

        // Keep going until live chords have released too
        if processor.playback_state() == PlaybackState::Exhausted && processor.pending_live_events() == 0 {
            break;
        }
    }

    println!("sequence: {}", shared.sequence_notes());
    let last = shared.last_chord_notes();
    if !last.is_empty() {
        println!("last live chord: {last}");
    }
}

fn describe(message: &MidiMessage) -> String {
    match *message {
        MidiMessage::NoteOn { pitch, velocity } => format!("on   {:<4} vel {velocity}", note_name(pitch)),
        MidiMessage::NoteOff { pitch } => format!("off  {}", note_name(pitch)),
        MidiMessage::ControlChange { controller, value } => format!("cc   {controller} = {value}"),
        MidiMessage::Clock => "clock".to_string(),
    }
}
