//! Shared helpers for integration tests
#![allow(dead_code)]

use justsynth::buffer::PcmBuffer;
use justsynth::envelope::EnvelopeSettings;
use justsynth::EngineConfig;

/// RMS level of 16-bit samples, normalized to full scale
pub fn calculate_rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let x = s as f64 / 32768.0;
            x * x
        })
        .sum();
    (sum / samples.len() as f64).sqrt()
}

/// Estimate the fundamental from upward zero crossings
pub fn zero_crossing_frequency(samples: &[i16], sample_rate: f64) -> f64 {
    let crossings: Vec<usize> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0 && w[1] >= 0)
        .map(|(i, _)| i)
        .collect();
    if crossings.len() < 2 {
        return 0.0;
    }
    let span = (crossings[crossings.len() - 1] - crossings[0]) as f64;
    (crossings.len() - 1) as f64 * sample_rate / span
}

/// Decoded samples of one channel
pub fn channel(buffer: &PcmBuffer, ch: usize) -> Vec<i16> {
    buffer.channel_samples(ch).collect()
}

/// Small buffers and an envelope that reaches full sustain almost at once
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        samples_per_buffer: 256,
        envelope: EnvelopeSettings::new(1, 1, 1.0, 1),
        ..EngineConfig::default()
    }
}

/// Hann-windowed magnitude spectrum; returns (bin width in Hz, magnitudes)
pub fn analyze_spectrum(samples: &[i16], sample_rate: f64, fft_size: usize) -> (f64, Vec<f64>) {
    use rustfft::{num_complex::Complex, FftPlanner};
    use std::f64::consts::PI;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut input: Vec<Complex<f64>> = samples[..fft_size]
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let window = 0.5 * (1.0 - (2.0 * PI * i as f64 / fft_size as f64).cos());
            Complex::new(s as f64 / 32768.0 * window, 0.0)
        })
        .collect();

    fft.process(&mut input);

    let magnitudes = input[..fft_size / 2].iter().map(|c| c.norm()).collect();
    (sample_rate / fft_size as f64, magnitudes)
}

/// Amplitude of the partial nearest `freq`, summing energy across the main lobe
pub fn partial_level(bin_hz: f64, magnitudes: &[f64], freq: f64) -> f64 {
    let center = (freq / bin_hz).round() as usize;
    let lo = center.saturating_sub(3);
    let hi = (center + 3).min(magnitudes.len() - 1);
    magnitudes[lo..=hi].iter().map(|m| m * m).sum::<f64>().sqrt()
}
