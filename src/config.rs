//! Engine configuration
//!
//! Everything fixed before the engine starts: stream format, timbre,
//! initial envelope and tuning, queue sizing. Loaded from TOML; missing
//! keys fall back to defaults.
//!
//! ```toml
//! sample_rate = 48000
//! samples_per_buffer = 256
//! harmonics = [1.0, 0.3]
//! mix_mode = "soft-clip"
//! tuning = "just5-sym"
//! base_note = 3
//!
//! [envelope]
//! attack_ms = 20
//! release_ms = 800
//! ```

use crate::envelope::EnvelopeSettings;
use crate::error::{SynthError, SynthResult};
use crate::mixer::MixMode;
use crate::oscillator::HarmonicSet;
use crate::tuning::{TuningSystem, NOTES_PER_OCTAVE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per second
    pub sample_rate: u32,
    /// Samples per channel in one block
    pub samples_per_buffer: usize,
    /// Weights of harmonics 1, 3, 5, ...
    pub harmonics: Vec<f64>,
    pub envelope: EnvelopeSettings,
    /// Slots in the note event queue
    pub event_queue_capacity: usize,
    pub mix_mode: MixMode,
    /// Tuning in effect at startup
    pub tuning: TuningSystem,
    pub base_note: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            samples_per_buffer: 512,
            harmonics: HarmonicSet::default().weights().to_vec(),
            envelope: EnvelopeSettings::default(),
            event_queue_capacity: 256,
            mix_mode: MixMode::Wrap,
            tuning: TuningSystem::EqualTempered,
            base_note: 0,
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> SynthResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> SynthResult<Self> {
        let mut config: EngineConfig =
            toml::from_str(content).map_err(|e| SynthError::Config(e.to_string()))?;
        config.envelope = config.envelope.clamped();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> SynthResult<()> {
        if self.sample_rate == 0 {
            return Err(SynthError::InvalidArgument(
                "sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.samples_per_buffer == 0 {
            return Err(SynthError::InvalidArgument(
                "samples_per_buffer must be greater than zero".to_string(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(SynthError::InvalidArgument(
                "event_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.base_note >= NOTES_PER_OCTAVE {
            return Err(SynthError::InvalidBaseNote(self.base_note));
        }
        self.harmonic_set()?;
        Ok(())
    }

    pub fn harmonic_set(&self) -> SynthResult<HarmonicSet> {
        HarmonicSet::new(self.harmonics.clone())
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate as f64
    }

    /// Wall-clock length of one block
    pub fn buffer_duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_buffer as f64 / self.sample_rate_hz())
    }
}
