//! Error types for the synthesizer
//!
//! Only configuration-time and control-surface calls can fail. The
//! per-sample generation path returns plain values.

use crate::tuning::TuningSystem;
use std::fmt;

/// Errors raised while configuring or controlling the engine
#[derive(Debug)]
pub enum SynthError {
    /// A parameter was outside its accepted domain
    InvalidArgument(String),
    /// Voice index outside 0..NUM_VOICES
    InvalidVoice(usize),
    /// Base note outside 0..12
    InvalidBaseNote(usize),
    /// Equal temperament has no rational interval set
    NoIntervalRatios(TuningSystem),
    /// The control event queue has no free slot
    EventQueueFull,
    /// Configuration could not be parsed
    Config(String),
    /// IO error
    Io(std::io::Error),
    /// Audio device or stream error
    Audio(String),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            SynthError::InvalidVoice(voice) => {
                write!(f, "Invalid voice index {} (expected 0..{})", voice, crate::NUM_VOICES)
            }
            SynthError::InvalidBaseNote(note) => {
                write!(f, "Invalid base note {} (expected 0..12)", note)
            }
            SynthError::NoIntervalRatios(system) => {
                write!(f, "{} has no rational interval ratios", system)
            }
            SynthError::EventQueueFull => write!(f, "Control event queue is full"),
            SynthError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SynthError::Io(e) => write!(f, "IO error: {}", e),
            SynthError::Audio(msg) => write!(f, "Audio error: {}", msg),
        }
    }
}

impl std::error::Error for SynthError {}

impl From<std::io::Error> for SynthError {
    fn from(e: std::io::Error) -> Self {
        SynthError::Io(e)
    }
}

/// Result type for synthesizer operations
pub type SynthResult<T> = Result<T, SynthError>;
