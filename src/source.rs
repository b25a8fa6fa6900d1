//! Pull-based sample sources
//!
//! Every stage of the signal chain (oscillator bank, VCA, mixer) implements
//! [`SampleSource`]. Stages compose by wrapping: the mixer owns a VCA, the
//! VCA owns the oscillator bank, and each `pull` first pulls from the stage
//! it wraps.

use crate::buffer::PcmBuffer;
use crate::NUM_VOICES;

/// Set of voice indices, one bit per voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceMask(u32);

impl VoiceMask {
    pub const NONE: VoiceMask = VoiceMask(0);
    pub const ALL: VoiceMask = VoiceMask((1 << NUM_VOICES) - 1);

    pub fn single(voice: usize) -> Self {
        debug_assert!(voice < NUM_VOICES);
        VoiceMask(1 << voice)
    }

    pub fn contains(self, voice: usize) -> bool {
        voice < NUM_VOICES && self.0 & (1 << voice) != 0
    }

    pub fn insert(&mut self, voice: usize) {
        debug_assert!(voice < NUM_VOICES);
        self.0 |= 1 << voice;
    }

    pub fn intersect(self, other: VoiceMask) -> Self {
        VoiceMask(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Voice indices in ascending order
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..NUM_VOICES).filter(move |&v| self.contains(v))
    }
}

impl FromIterator<usize> for VoiceMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = VoiceMask::NONE;
        for voice in iter {
            mask.insert(voice);
        }
        mask
    }
}

/// A stage that fills a [`PcmBuffer`] on demand
///
/// Called once per block from the audio thread. Implementations must not
/// block or allocate.
pub trait SampleSource: Send {
    /// Fill `buffer` for the voices in `voices` and return the number of
    /// samples produced per channel.
    fn pull(&mut self, buffer: &mut PcmBuffer, voices: VoiceMask) -> usize;

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "SampleSource"
    }
}
