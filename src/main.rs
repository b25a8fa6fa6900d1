//! JustSynth CLI - play the synthesizer and inspect its tunings

use clap::{Parser, Subcommand};
use justsynth::audio::AudioOutput;
use justsynth::intervals::{cents_matrix, ratio_matrix};
use justsynth::tuning::{compute_frequencies, note_name, voice_name, TuningSystem};
use justsynth::{Controller, EngineConfig, SynthEngine, NUM_VOICES};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser)]
#[command(name = "justsynth")]
#[command(about = "Polyphonic additive synthesizer with just intonation", long_about = None)]
struct Cli {
    /// Engine config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Sample rate in Hz (overrides the config file)
    #[arg(short, long, global = true)]
    sample_rate: Option<u32>,

    /// Samples per buffer (overrides the config file)
    #[arg(short, long, global = true)]
    buffer_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the default audio device
    ///
    /// With --notes, plays that chord for --duration seconds and releases
    /// it. Otherwise reads commands from stdin, one per line:
    /// on <voice>, off <voice>, tune <system> [base], attack|decay|release <ms>,
    /// sustain <level>, stats, quit
    Play {
        /// Voices to sound, comma separated (0 = A2 ... 22 = G4)
        #[arg(short, long, value_delimiter = ',')]
        notes: Vec<usize>,

        /// Seconds to hold the chord
        #[arg(short, long, default_value = "2.0")]
        duration: f32,

        /// Tuning system (equal, just7, just5-ext, just5-sym, pythagorean)
        #[arg(short, long)]
        tuning: Option<TuningSystem>,

        /// Base note of just tunings (0 = A ... 11 = G#)
        #[arg(long)]
        base: Option<usize>,
    },

    /// Print the frequency table of a tuning
    Table {
        /// Tuning system
        #[arg(default_value = "equal")]
        tuning: TuningSystem,

        /// Base note (0 = A ... 11 = G#)
        #[arg(long, default_value = "0")]
        base: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the 12x12 interval matrix of a tuning
    Intervals {
        /// Tuning system
        #[arg(default_value = "equal")]
        tuning: TuningSystem,

        /// Base note (0 = A ... 11 = G#)
        #[arg(long, default_value = "0")]
        base: usize,

        /// Show exact ratios instead of cents (just tunings only)
        #[arg(long)]
        ratios: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(rate) = cli.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(size) = cli.buffer_size {
        config.samples_per_buffer = size;
    }
    config.validate()?;
    Ok(config)
}

/// Apply one interactive command; returns false on quit
fn run_command(line: &str, controller: &mut Controller) -> Result<bool, Box<dyn std::error::Error>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let arg = words.next();

    match (command, arg) {
        ("quit" | "exit" | "q", _) => return Ok(false),
        ("on", Some(voice)) => controller.note_on(voice.parse()?)?,
        ("off", Some(voice)) => controller.note_off(voice.parse()?)?,
        ("tune", Some(system)) => {
            let base = words.next().map(str::parse::<usize>).transpose()?.unwrap_or(0);
            controller.set_tuning(system.parse()?, base)?;
        }
        ("attack", Some(ms)) => controller.set_attack_time_ms(ms.parse()?),
        ("decay", Some(ms)) => controller.set_decay_time_ms(ms.parse()?),
        ("sustain", Some(level)) => controller.set_sustain_level(level.parse()?),
        ("release", Some(ms)) => controller.set_release_time_ms(ms.parse()?),
        ("stats", _) => println!("{}", serde_json::to_string(&controller.stats().snapshot())?),
        _ => eprintln!("Unknown command: {}", line.trim()),
    }
    Ok(true)
}

/// Sleep for `duration`, logging underruns as they are counted
fn wait_reporting(controller: &mut Controller, duration: Duration) {
    let deadline = Instant::now() + duration;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        thread::sleep(left.min(Duration::from_millis(250)));
        controller.report_underruns();
        if left <= Duration::from_millis(250) {
            break;
        }
    }
}

fn play(
    config: EngineConfig,
    notes: Vec<usize>,
    duration: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let release = Duration::from_millis(config.envelope.release_ms as u64 + 100);
    let (engine, mut controller) = SynthEngine::new(&config)?;
    let output = AudioOutput::start(engine)?;

    if notes.is_empty() {
        println!("Ready. Commands: on/off <voice>, tune <system> [base], attack/decay/release <ms>, sustain <level>, stats, quit");
        for line in std::io::stdin().lock().lines() {
            let line = line?;
            controller.report_underruns();
            match run_command(&line, &mut controller) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    } else {
        for &voice in &notes {
            controller.note_on(voice)?;
        }
        let names: Vec<String> = notes.iter().map(|&v| voice_name(v)).collect();
        info!("Playing {}", names.join(" "));
        wait_reporting(&mut controller, Duration::from_secs_f32(duration.max(0.0)));
        for &voice in &notes {
            controller.note_off(voice)?;
        }
        wait_reporting(&mut controller, release);
    }
    controller.report_underruns();

    let stats = controller.stats().snapshot();
    output.stop()?;
    info!(
        "Rendered {} buffers, {} underruns",
        stats.buffers_rendered, stats.underruns
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Play {
            notes,
            duration,
            tuning,
            base,
        } => {
            let mut config = config;
            if let Some(system) = tuning {
                config.tuning = system;
            }
            if let Some(base) = base {
                config.base_note = base;
            }
            play(config, notes, duration)?;
        }

        Commands::Table { tuning, base, json } => {
            let table = compute_frequencies(tuning, base)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{} on {}", tuning, note_name(base));
                for voice in 0..NUM_VOICES {
                    let period = table.period(voice, config.sample_rate_hz());
                    println!(
                        "{:>2}  {:<4} {:>10.4} Hz  {:>9.3} samples",
                        voice,
                        voice_name(voice),
                        table.frequency(voice),
                        period
                    );
                }
                println!("A4 = {:.4} Hz", table.reference_a4());
            }
        }

        Commands::Intervals {
            tuning,
            base,
            ratios,
            json,
        } => {
            if ratios {
                let matrix = ratio_matrix(tuning, base)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&matrix)?);
                } else {
                    println!("{} on {} (ratios)", tuning, note_name(base));
                    for (row, cells) in matrix.cells.iter().enumerate() {
                        let line: Vec<String> = cells.iter().map(|r| format!("{:>7}", r)).collect();
                        println!("{:<3}{}", note_name(row), line.join(""));
                    }
                }
            } else {
                let table = compute_frequencies(tuning, base)?;
                let matrix = cents_matrix(&table);
                if json {
                    println!("{}", serde_json::to_string_pretty(&matrix)?);
                } else {
                    println!("{} on {} (cents)", tuning, note_name(base));
                    for (row, cells) in matrix.cells.iter().enumerate() {
                        let line: Vec<String> = cells.iter().map(|c| format!("{:>8.1}", c)).collect();
                        println!("{:<3}{}", note_name(row), line.join(""));
                    }
                }
            }
        }
    }

    Ok(())
}
