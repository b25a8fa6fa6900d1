//! Per-voice PCM buffers
//!
//! One block of signed 16-bit samples per voice channel plus one master
//! channel. Samples are stored big-endian, high byte first, so a channel of
//! `n` samples is `2 * n` bytes. All channels live in one contiguous
//! allocation made at engine init and reused for every block.

use crate::NUM_VOICES;

/// Index of the summed output channel
pub const MASTER_CHANNEL: usize = NUM_VOICES;

/// Voice channels plus the master channel
pub const NUM_CHANNELS: usize = NUM_VOICES + 1;

/// Bytes per 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone)]
pub struct PcmBuffer {
    samples_per_buffer: usize,
    data: Vec<u8>,
}

impl PcmBuffer {
    /// Allocate a zeroed buffer holding `samples_per_buffer` samples per channel
    pub fn new(samples_per_buffer: usize) -> Self {
        Self {
            samples_per_buffer,
            data: vec![0; NUM_CHANNELS * samples_per_buffer * BYTES_PER_SAMPLE],
        }
    }

    pub fn samples_per_buffer(&self) -> usize {
        self.samples_per_buffer
    }

    /// Length of one channel in bytes
    pub fn channel_len(&self) -> usize {
        self.samples_per_buffer * BYTES_PER_SAMPLE
    }

    #[inline]
    fn offset(&self, channel: usize, index: usize) -> usize {
        debug_assert!(channel < NUM_CHANNELS && index < self.samples_per_buffer);
        channel * self.channel_len() + index * BYTES_PER_SAMPLE
    }

    /// Read one sample
    #[inline]
    pub fn sample(&self, channel: usize, index: usize) -> i16 {
        let at = self.offset(channel, index);
        i16::from_be_bytes([self.data[at], self.data[at + 1]])
    }

    /// Write one sample
    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: i16) {
        let at = self.offset(channel, index);
        let [hi, lo] = value.to_be_bytes();
        self.data[at] = hi;
        self.data[at + 1] = lo;
    }

    /// Raw big-endian bytes of one channel
    pub fn channel_bytes(&self, channel: usize) -> &[u8] {
        let start = channel * self.channel_len();
        &self.data[start..start + self.channel_len()]
    }

    /// Decoded samples of one channel
    pub fn channel_samples(&self, channel: usize) -> impl Iterator<Item = i16> + '_ {
        self.channel_bytes(channel)
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
    }

    /// Decoded samples of the master channel
    pub fn master_samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.channel_samples(MASTER_CHANNEL)
    }

    /// Zero every channel
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
