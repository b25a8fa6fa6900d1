//! # JustSynth - Polyphonic Additive Synthesizer with Just Intonation
//!
//! A 23-voice synthesizer whose voices span A2 to G4 chromatically. Each
//! voice is a fixed slot with its own additive oscillator and ADSR
//! envelope, and the whole instrument can be retuned on the fly between
//! equal temperament and several just-intonation systems.
//!
//! ## Signal Chain
//!
//! ```text
//! Controller ──events──► SynthEngine
//!                          │
//!                          ▼
//!                        Mixer ─► Vca (envelopes) ─► OscillatorBank
//!                          │
//!                          ▼
//!                    master channel ─► AudioOutput (cpal)
//! ```
//!
//! Every stage implements [`source::SampleSource`] and pulls from the stage
//! it wraps. Samples are 16-bit big-endian PCM, one channel per voice plus
//! a summed master channel.
//!
//! ## Tuning Systems
//!
//! - **Equal Tempered**: `110 * 2^(n/12)`
//! - **Just 7-Limit**: septimal ratios (8/7, 7/5, 7/4)
//! - **Just 5-Limit (Extended)** and **(Symmetric)**: two 5-limit variants
//! - **Pythagorean**: stacked pure fifths
//!
//! Just systems are built from a movable tonic (`base_note`).
//!
//! ## Quick Start
//!
//! ```rust
//! use justsynth::config::EngineConfig;
//! use justsynth::engine::SynthEngine;
//! use justsynth::tuning::TuningSystem;
//!
//! let (mut engine, mut controller) = SynthEngine::new(&EngineConfig::default()).unwrap();
//!
//! controller.set_tuning(TuningSystem::Just5Sym, 0).unwrap();
//! controller.note_on(0).unwrap();
//! controller.note_on(4).unwrap();
//! controller.note_on(7).unwrap();
//!
//! // One second of the master channel
//! let samples = engine.render(44100 / 512);
//! assert!(samples.iter().any(|&s| s != 0));
//! ```

/// Number of voice slots
pub const NUM_VOICES: usize = 23;

pub mod audio;
pub mod buffer;
pub mod config;
pub mod control;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod intervals;
pub mod mixer;
pub mod oscillator;
pub mod ratio;
pub mod source;
pub mod tuning;
pub mod vca;

pub use config::EngineConfig;
pub use control::{ControlEvent, Controller};
pub use engine::{PlaybackStats, SynthEngine};
pub use error::{SynthError, SynthResult};
pub use tuning::{compute_frequencies, FrequencyTable, TuningSystem};
