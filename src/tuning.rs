//! Tuning tables
//!
//! Computes the per-voice frequency table for one of five tuning systems.
//! Voice 0 is A2 (110 Hz) and voice 22 is G4, two chromatic octaves less
//! one semitone.
//!
//! Just-intonation systems are defined by twelve exact ratios relative to a
//! tonic. The tonic (`base_note`, 0..12, counted from A) keeps its
//! equal-tempered pitch; the ratio block is laid out from there and the
//! remaining voices are filled in as octaves of that block.

use crate::error::{SynthError, SynthResult};
use crate::ratio::Ratio;
use crate::NUM_VOICES;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frequency of voice 0 (A2)
pub const BASE_FREQUENCY: f64 = 110.0;

/// Number of pitch classes in one octave
pub const NOTES_PER_OCTAVE: usize = 12;

const NOTE_NAMES: [&str; NOTES_PER_OCTAVE] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Supported tuning systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningSystem {
    EqualTempered,
    Just7Limit,
    Just5Ext,
    Just5Sym,
    Pythagorean,
}

impl TuningSystem {
    pub const ALL: [TuningSystem; 5] = [
        TuningSystem::EqualTempered,
        TuningSystem::Just7Limit,
        TuningSystem::Just5Ext,
        TuningSystem::Just5Sym,
        TuningSystem::Pythagorean,
    ];

    pub fn index(self) -> usize {
        match self {
            TuningSystem::EqualTempered => 0,
            TuningSystem::Just7Limit => 1,
            TuningSystem::Just5Ext => 2,
            TuningSystem::Just5Sym => 3,
            TuningSystem::Pythagorean => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TuningSystem::EqualTempered => "Equal Tempered",
            TuningSystem::Just7Limit => "Just 7-Limit",
            TuningSystem::Just5Ext => "Just 5-Limit (Extended)",
            TuningSystem::Just5Sym => "Just 5-Limit (Symmetric)",
            TuningSystem::Pythagorean => "Pythagorean",
        }
    }

    /// Next system, wrapping around
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Previous system, wrapping around
    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn is_just(self) -> bool {
        self != TuningSystem::EqualTempered
    }
}

impl fmt::Display for TuningSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<usize> for TuningSystem {
    type Error = SynthError;

    fn try_from(index: usize) -> SynthResult<Self> {
        Self::ALL.get(index).copied().ok_or_else(|| {
            SynthError::InvalidArgument(format!(
                "tuning system index {} (expected 0..{})",
                index,
                Self::ALL.len()
            ))
        })
    }
}

impl FromStr for TuningSystem {
    type Err = SynthError;

    fn from_str(s: &str) -> SynthResult<Self> {
        match s.to_lowercase().as_str() {
            "equal" | "equal-tempered" | "et" | "12tet" => Ok(TuningSystem::EqualTempered),
            "just7" | "just7-limit" | "just-7-limit" | "7-limit" => Ok(TuningSystem::Just7Limit),
            "just5ext" | "just5-ext" | "just-5-ext" | "5-limit-extended" => Ok(TuningSystem::Just5Ext),
            "just5sym" | "just5-sym" | "just-5-sym" | "5-limit-symmetric" => Ok(TuningSystem::Just5Sym),
            "pythagorean" | "pyth" => Ok(TuningSystem::Pythagorean),
            other => Err(SynthError::InvalidArgument(format!(
                "unknown tuning system '{}'",
                other
            ))),
        }
    }
}

const JUST_7_LIMIT: [Ratio; 12] = [
    Ratio::new(1, 1),
    Ratio::new(16, 15),
    Ratio::new(8, 7),
    Ratio::new(6, 5),
    Ratio::new(5, 4),
    Ratio::new(4, 3),
    Ratio::new(7, 5),
    Ratio::new(3, 2),
    Ratio::new(8, 5),
    Ratio::new(5, 3),
    Ratio::new(7, 4),
    Ratio::new(15, 8),
];

const JUST_5_EXT: [Ratio; 12] = [
    Ratio::new(1, 1),
    Ratio::new(16, 15),
    Ratio::new(9, 8),
    Ratio::new(6, 5),
    Ratio::new(5, 4),
    Ratio::new(4, 3),
    Ratio::new(25, 18),
    Ratio::new(3, 2),
    Ratio::new(8, 5),
    Ratio::new(5, 3),
    Ratio::new(9, 5),
    Ratio::new(15, 8),
];

const JUST_5_SYM: [Ratio; 12] = [
    Ratio::new(1, 1),
    Ratio::new(16, 15),
    Ratio::new(9, 8),
    Ratio::new(6, 5),
    Ratio::new(5, 4),
    Ratio::new(4, 3),
    Ratio::new(45, 32),
    Ratio::new(3, 2),
    Ratio::new(8, 5),
    Ratio::new(5, 3),
    Ratio::new(16, 9),
    Ratio::new(15, 8),
];

const PYTHAGOREAN: [Ratio; 12] = [
    Ratio::new(1, 1),
    Ratio::new(256, 243),
    Ratio::new(9, 8),
    Ratio::new(32, 27),
    Ratio::new(81, 64),
    Ratio::new(4, 3),
    Ratio::new(729, 512),
    Ratio::new(3, 2),
    Ratio::new(128, 81),
    Ratio::new(27, 16),
    Ratio::new(16, 9),
    Ratio::new(243, 128),
];

/// The twelve tonic-relative ratios of a just-intonation system
pub fn interval_ratios(system: TuningSystem) -> SynthResult<[Ratio; 12]> {
    match system {
        TuningSystem::EqualTempered => Err(SynthError::NoIntervalRatios(system)),
        TuningSystem::Just7Limit => Ok(JUST_7_LIMIT),
        TuningSystem::Just5Ext => Ok(JUST_5_EXT),
        TuningSystem::Just5Sym => Ok(JUST_5_SYM),
        TuningSystem::Pythagorean => Ok(PYTHAGOREAN),
    }
}

/// Equal-tempered frequency of a voice
pub fn equal_tempered_frequency(voice: usize) -> f64 {
    BASE_FREQUENCY * 2.0_f64.powf(voice as f64 / NOTES_PER_OCTAVE as f64)
}

/// Note name of a voice, e.g. voice 0 is "A2" and voice 22 is "G4"
pub fn voice_name(voice: usize) -> String {
    // Octave numbers change at C (index 3 from A)
    let octave = 2 + (voice + NOTES_PER_OCTAVE - 3) / NOTES_PER_OCTAVE;
    format!("{}{}", NOTE_NAMES[voice % NOTES_PER_OCTAVE], octave)
}

/// Pitch-class name of a base note (0 = A)
pub fn note_name(base_note: usize) -> &'static str {
    NOTE_NAMES[base_note % NOTES_PER_OCTAVE]
}

/// Complete, validated per-voice frequency table
///
/// Tables are immutable once built; a tuning change publishes a new table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTable {
    system: TuningSystem,
    base_note: usize,
    frequencies: [f64; NUM_VOICES],
}

impl FrequencyTable {
    /// Wrap raw frequencies, rejecting any entry that is not strictly positive
    pub fn new(
        system: TuningSystem,
        base_note: usize,
        frequencies: [f64; NUM_VOICES],
    ) -> SynthResult<Self> {
        if let Some((voice, freq)) = frequencies
            .iter()
            .enumerate()
            .find(|(_, f)| !(f.is_finite() && **f > 0.0))
        {
            return Err(SynthError::InvalidArgument(format!(
                "frequency of voice {} must be positive, got {}",
                voice, freq
            )));
        }
        Ok(Self {
            system,
            base_note,
            frequencies,
        })
    }

    /// The equal-tempered table (engine default)
    pub fn equal_tempered() -> Self {
        Self {
            system: TuningSystem::EqualTempered,
            base_note: 0,
            frequencies: std::array::from_fn(equal_tempered_frequency),
        }
    }

    pub fn system(&self) -> TuningSystem {
        self.system
    }

    pub fn base_note(&self) -> usize {
        self.base_note
    }

    pub fn frequency(&self, voice: usize) -> f64 {
        self.frequencies[voice]
    }

    pub fn frequencies(&self) -> &[f64; NUM_VOICES] {
        &self.frequencies
    }

    /// Length of one waveform cycle in samples
    pub fn period(&self, voice: usize, sample_rate: f64) -> f64 {
        sample_rate / self.frequencies[voice]
    }

    /// Pitch of A4 under this table (two octaves above voice 0)
    pub fn reference_a4(&self) -> f64 {
        self.frequencies[0] * 4.0
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::equal_tempered()
    }
}

/// Compute the 23-voice frequency table for a tuning system and base note
pub fn compute_frequencies(system: TuningSystem, base_note: usize) -> SynthResult<FrequencyTable> {
    if base_note >= NOTES_PER_OCTAVE {
        return Err(SynthError::InvalidBaseNote(base_note));
    }

    let ratios = match system {
        TuningSystem::EqualTempered => {
            // Same pitches for every base note; the base is kept for display
            return Ok(FrequencyTable {
                base_note,
                ..FrequencyTable::equal_tempered()
            });
        }
        just => interval_ratios(just)?,
    };

    let mut freqs = [0.0_f64; NUM_VOICES];
    let tonic = equal_tempered_frequency(base_note);

    // One chromatic block from the tonic
    for (k, ratio) in ratios.iter().enumerate() {
        freqs[base_note + k] = tonic * ratio.to_f64();
    }

    // Octaves down below the midpoint, then octaves up from it. Only empty
    // slots are written, and the downward pass must run first.
    let mid = NUM_VOICES / 2;
    for i in 0..mid {
        if freqs[i] == 0.0 {
            freqs[i] = freqs[i + NOTES_PER_OCTAVE] / 2.0;
        }
    }
    for i in mid..NUM_VOICES {
        if freqs[i] == 0.0 {
            freqs[i] = freqs[i - NOTES_PER_OCTAVE] * 2.0;
        }
    }

    FrequencyTable::new(system, base_note, freqs)
}
