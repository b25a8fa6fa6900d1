//! Voltage-controlled amplifier stage
//!
//! Scales each voice channel by its envelope, one envelope tick per voice
//! per sample. The VCA owns the [`EnvelopeGenerator`]; note events reach it
//! through [`Vca::envelope_mut`].

use crate::buffer::PcmBuffer;
use crate::envelope::EnvelopeGenerator;
use crate::source::{SampleSource, VoiceMask};

pub struct Vca<S: SampleSource> {
    source: S,
    envelope: EnvelopeGenerator,
}

impl<S: SampleSource> Vca<S> {
    pub fn new(source: S, envelope: EnvelopeGenerator) -> Self {
        Self { source, envelope }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn envelope(&self) -> &EnvelopeGenerator {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut EnvelopeGenerator {
        &mut self.envelope
    }
}

/// Apply a gain in [0, 1] to a 16-bit sample, truncating toward zero
#[inline]
fn apply_gain(sample: i16, gain: f64) -> i16 {
    (sample as f64 * gain) as i16
}

impl<S: SampleSource> SampleSource for Vca<S> {
    /// Pulls only the voices that can sound this block, then envelopes every
    /// voice in `voices`. Voices that were not pulled are Idle for the whole
    /// block and come out as silence.
    fn pull(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize {
        let sounding = voices.intersect(self.envelope.sounding_voices());
        let n = self.source.pull(buffer, sounding);

        for voice in voices.iter() {
            for i in 0..n {
                let gain = self.envelope.tick(voice);
                let sample = buffer.sample(voice, i);
                buffer.set_sample(voice, i, apply_gain(sample, gain));
            }
        }
        n
    }

    fn name(&self) -> &str {
        "Vca"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeSettings, EnvelopeStage};

    /// Writes a constant into every requested voice and records the hint
    struct ConstantSource {
        value: i16,
        last_hint: VoiceMask,
    }

    impl SampleSource for ConstantSource {
        fn pull(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize {
            self.last_hint = voices;
            for voice in voices.iter() {
                for i in 0..buffer.samples_per_buffer() {
                    buffer.set_sample(voice, i, self.value);
                }
            }
            buffer.samples_per_buffer()
        }
    }

    fn vca(value: i16, settings: EnvelopeSettings) -> Vca<ConstantSource> {
        Vca::new(
            ConstantSource {
                value,
                last_hint: VoiceMask::NONE,
            },
            EnvelopeGenerator::new(settings, 44100.0),
        )
    }

    #[test]
    fn test_idle_voices_are_silenced() {
        let mut vca = vca(10000, EnvelopeSettings::default());
        let mut buffer = PcmBuffer::new(32);
        // Stale data from an earlier block
        buffer.set_sample(6, 3, 2222);

        vca.pull(&mut buffer, VoiceMask::ALL);

        assert!(vca.source().last_hint.is_empty());
        for voice in 0..crate::NUM_VOICES {
            assert!(buffer.channel_samples(voice).all(|s| s == 0));
        }
    }

    #[test]
    fn test_sustain_scales_and_truncates() {
        let mut vca = vca(10001, EnvelopeSettings::new(1, 1, 0.5, 100));
        let mut buffer = PcmBuffer::new(256);
        vca.envelope_mut().note_on(2);
        vca.pull(&mut buffer, VoiceMask::ALL);
        vca.pull(&mut buffer, VoiceMask::ALL);

        assert_eq!(vca.envelope().stage(2), EnvelopeStage::Sustain);
        assert_eq!(vca.source().last_hint, VoiceMask::single(2));
        // 10001 * 0.5 = 5000.5 truncates to 5000
        assert!(buffer.channel_samples(2).all(|s| s == 5000));
    }

    #[test]
    fn test_attack_starts_from_silence() {
        let mut vca = vca(20000, EnvelopeSettings::new(10, 10, 0.5, 10));
        let mut buffer = PcmBuffer::new(64);
        vca.envelope_mut().note_on(0);
        vca.pull(&mut buffer, VoiceMask::ALL);

        let samples: Vec<i16> = buffer.channel_samples(0).collect();
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], 0);
        assert!(samples.windows(2).all(|w| w[1] >= w[0]));
        assert!(samples[63] > 0);
    }

    #[test]
    fn test_hint_limits_processed_voices() {
        let mut vca = vca(1000, EnvelopeSettings::new(1, 1, 1.0, 1));
        let mut buffer = PcmBuffer::new(16);
        vca.envelope_mut().note_on(1);
        vca.envelope_mut().note_on(2);
        vca.pull(&mut buffer, VoiceMask::single(1));

        assert_eq!(vca.source().last_hint, VoiceMask::single(1));
        // Voice 2 was outside the hint, so its envelope never ticked
        assert!(vca.envelope().is_idle(2));
        assert!(!vca.envelope().is_idle(1));
    }
}
