/// Oscillator bank - additive synthesis for all 23 voices
///
/// Each voice sums a fixed set of weighted sine harmonics at odd multiples
/// of its fundamental (1st, 3rd, 5th, ...), which leans the timbre toward a
/// soft square wave.
///
/// # Theory
///
/// Output = Σ (weight[k] × sin(2π × (2k+1) × freq × phase / sample_rate)) / Σ weight
///
/// `phase` is a per-voice sample counter. It advances by one per sample and
/// wraps by subtracting one period (`sample_rate / freq`) when it runs past
/// the end of a cycle, so the waveform stays continuous across the wrap.
///
/// Dividing by the weight sum keeps the peak level independent of how many
/// harmonics are configured.
///
/// # Output level
///
/// Samples are scaled to a third of full 16-bit scale before quantizing,
/// which leaves headroom for several voices summed in the mixer.
use crate::buffer::PcmBuffer;
use crate::error::{SynthError, SynthResult};
use crate::source::{SampleSource, VoiceMask};
use crate::tuning::FrequencyTable;
use crate::NUM_VOICES;
use std::f64::consts::PI;

/// Peak level of a single voice before enveloping
pub const VOICE_PEAK: f64 = i16::MAX as f64 / 3.0;

/// Harmonic amplitude weights and their precomputed sum
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicSet {
    weights: Vec<f64>,
    sum: f64,
}

impl HarmonicSet {
    /// Build a harmonic set; weight `k` applies to harmonic `2k + 1`.
    ///
    /// Rejects an empty list or a weight sum that is not a positive finite
    /// number, since the sum is the output divisor.
    pub fn new(weights: Vec<f64>) -> SynthResult<Self> {
        if weights.is_empty() {
            return Err(SynthError::InvalidArgument(
                "harmonic set needs at least one weight".to_string(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(SynthError::InvalidArgument(format!(
                "harmonic weights must sum to a positive number, got {}",
                sum
            )));
        }
        Ok(Self { weights, sum })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }
}

impl Default for HarmonicSet {
    fn default() -> Self {
        let weights = vec![0.8, 0.6, 0.4, 0.4];
        let sum = weights.iter().sum();
        Self { weights, sum }
    }
}

/// Per-voice additive oscillators sharing one harmonic set
pub struct OscillatorBank {
    sample_rate: f64,
    harmonics: HarmonicSet,
    frequencies: [f64; NUM_VOICES],
    /// Samples per cycle for each voice
    periods: [f64; NUM_VOICES],
    /// Position within the current cycle, in samples
    phases: [f64; NUM_VOICES],
}

impl OscillatorBank {
    pub fn new(sample_rate: f64, harmonics: HarmonicSet, table: &FrequencyTable) -> Self {
        let mut bank = Self {
            sample_rate,
            harmonics,
            frequencies: [0.0; NUM_VOICES],
            periods: [0.0; NUM_VOICES],
            phases: [0.0; NUM_VOICES],
        };
        bank.set_frequencies(table);
        bank
    }

    /// Adopt a new frequency table. Phases are kept so running notes do not
    /// restart their cycle.
    pub fn set_frequencies(&mut self, table: &FrequencyTable) {
        for voice in 0..NUM_VOICES {
            self.frequencies[voice] = table.frequency(voice);
            self.periods[voice] = table.period(voice, self.sample_rate);
        }
    }

    pub fn frequency(&self, voice: usize) -> f64 {
        self.frequencies[voice]
    }

    pub fn period(&self, voice: usize) -> f64 {
        self.periods[voice]
    }

    pub fn phase(&self, voice: usize) -> f64 {
        self.phases[voice]
    }

    pub fn harmonics(&self) -> &HarmonicSet {
        &self.harmonics
    }

    /// Next normalized sample of one voice, in [-1, 1]
    pub fn produce_sample(&mut self, voice: usize) -> f64 {
        let base = 2.0 * PI * self.frequencies[voice] * self.phases[voice] / self.sample_rate;

        let mut value = 0.0;
        for (k, weight) in self.harmonics.weights.iter().enumerate() {
            value += weight * ((2 * k + 1) as f64 * base).sin();
        }

        self.phases[voice] += 1.0;
        if self.phases[voice] > self.periods[voice] {
            self.phases[voice] -= self.periods[voice];
        }

        value / self.harmonics.sum
    }

    /// Write one block of quantized samples for each voice in `voices`.
    /// Channels of other voices are left untouched.
    pub fn fill_buffer(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize {
        let n = buffer.samples_per_buffer();
        for voice in voices.iter() {
            for i in 0..n {
                let scaled = self.produce_sample(voice) * VOICE_PEAK;
                buffer.set_sample(voice, i, scaled.round() as i16);
            }
        }
        n
    }
}

impl SampleSource for OscillatorBank {
    fn pull(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize {
        self.fill_buffer(buffer, voices)
    }

    fn name(&self) -> &str {
        "OscillatorBank"
    }
}
