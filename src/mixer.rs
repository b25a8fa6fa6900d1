//! Mixer - sums every voice channel into the master channel

use crate::buffer::{PcmBuffer, MASTER_CHANNEL};
use crate::source::{SampleSource, VoiceMask};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the voice sum is brought back into 16-bit range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixMode {
    /// Two's-complement wraparound, so loud chords overflow audibly
    #[default]
    Wrap,
    /// tanh saturation of the full-precision sum
    SoftClip,
}

impl fmt::Display for MixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixMode::Wrap => write!(f, "wrap"),
            MixMode::SoftClip => write!(f, "soft-clip"),
        }
    }
}

impl FromStr for MixMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wrap" => Ok(MixMode::Wrap),
            "soft-clip" | "softclip" | "soft_clip" => Ok(MixMode::SoftClip),
            other => Err(format!("unknown mix mode '{}'", other)),
        }
    }
}

fn soft_clip(sum: i32) -> i16 {
    let full_scale = i16::MAX as f64;
    let x = sum as f64 / full_scale;
    (x.tanh() * full_scale).round() as i16
}

pub struct Mixer<S: SampleSource> {
    source: S,
    mode: MixMode,
}

impl<S: SampleSource> Mixer<S> {
    pub fn new(source: S, mode: MixMode) -> Self {
        Self { source, mode }
    }

    pub fn mode(&self) -> MixMode {
        self.mode
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SampleSource> SampleSource for Mixer<S> {
    fn pull(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize {
        let n = self.source.pull(buffer, voices);

        for i in 0..n {
            let master = match self.mode {
                MixMode::Wrap => voices
                    .iter()
                    .fold(0i16, |acc, v| acc.wrapping_add(buffer.sample(v, i))),
                MixMode::SoftClip => {
                    soft_clip(voices.iter().map(|v| buffer.sample(v, i) as i32).sum())
                }
            };
            buffer.set_sample(MASTER_CHANNEL, i, master);
        }
        n
    }

    fn name(&self) -> &str {
        "Mixer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes fixed per-voice values
    struct FixedVoices(Vec<(usize, i16)>);

    impl SampleSource for FixedVoices {
        fn pull(&mut self, buffer: &mut PcmBuffer, _voices: VoiceMask) -> usize {
            for &(voice, value) in &self.0 {
                for i in 0..buffer.samples_per_buffer() {
                    buffer.set_sample(voice, i, value);
                }
            }
            buffer.samples_per_buffer()
        }
    }

    fn mix(mode: MixMode, voices: Vec<(usize, i16)>) -> Vec<i16> {
        let mut mixer = Mixer::new(FixedVoices(voices), mode);
        let mut buffer = PcmBuffer::new(8);
        mixer.pull(&mut buffer, VoiceMask::ALL);
        buffer.master_samples().collect()
    }

    #[test]
    fn test_sum_of_voices() {
        let master = mix(MixMode::Wrap, vec![(0, 100), (5, -30), (22, 7)]);
        assert!(master.iter().all(|&s| s == 77));
    }

    #[test]
    fn test_overflow_wraps() {
        let master = mix(MixMode::Wrap, vec![(0, 25000), (1, 25000)]);
        assert!(master.iter().all(|&s| s == -15536));
    }

    #[test]
    fn test_soft_clip_saturates() {
        let master = mix(MixMode::SoftClip, vec![(0, 25000), (1, 25000)]);
        assert!(master.iter().all(|&s| s > 29000 && s <= i16::MAX));
        let quiet = mix(MixMode::SoftClip, vec![(3, 100)]);
        assert!(quiet.iter().all(|&s| s == 100));
    }

    #[test]
    fn test_silence_mixes_to_silence() {
        for mode in [MixMode::Wrap, MixMode::SoftClip] {
            assert!(mix(mode, vec![]).iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("wrap".parse::<MixMode>(), Ok(MixMode::Wrap));
        assert_eq!("Soft-Clip".parse::<MixMode>(), Ok(MixMode::SoftClip));
        assert!("loud".parse::<MixMode>().is_err());
    }
}
