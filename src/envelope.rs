//! ADSR envelope generator for all voices
//!
//! One linear attack/decay/sustain/release state machine per voice, all
//! sharing a single set of timing parameters. [`EnvelopeGenerator::tick`]
//! must be called exactly once per voice per sample: every duration is a
//! sample count derived from the sample rate.
//!
//! Note events are edge-triggered flags. A flag is consumed by the tick
//! that acts on it, and several events of the same kind between two ticks
//! collapse into one.
//!
//! A note-on that arrives while a voice is sounding cancels the voice to
//! Idle instead of restarting the attack.

use crate::source::VoiceMask;
use crate::NUM_VOICES;
use serde::{Deserialize, Serialize};

pub const MS_MIN: u32 = 1;
pub const MS_MAX: u32 = 5000;
pub const SUSTAIN_MIN: f64 = 0.0;
pub const SUSTAIN_MAX: f64 = 1.0;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// User-facing envelope parameters, always within range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    pub attack_ms: u32,
    pub decay_ms: u32,
    pub sustain: f64,
    pub release_ms: u32,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack_ms: 150,
            decay_ms: 80,
            sustain: 0.4,
            release_ms: 400,
        }
    }
}

fn clamp_ms(ms: u32) -> u32 {
    ms.clamp(MS_MIN, MS_MAX)
}

fn clamp_sustain(level: f64) -> f64 {
    if level.is_nan() {
        SUSTAIN_MIN
    } else {
        level.clamp(SUSTAIN_MIN, SUSTAIN_MAX)
    }
}

impl EnvelopeSettings {
    pub fn new(attack_ms: u32, decay_ms: u32, sustain: f64, release_ms: u32) -> Self {
        Self {
            attack_ms: clamp_ms(attack_ms),
            decay_ms: clamp_ms(decay_ms),
            sustain: clamp_sustain(sustain),
            release_ms: clamp_ms(release_ms),
        }
    }

    /// Bring deserialized or hand-built values back into range
    pub fn clamped(self) -> Self {
        Self::new(self.attack_ms, self.decay_ms, self.sustain, self.release_ms)
    }

    pub fn with_attack_ms(self, ms: u32) -> Self {
        Self {
            attack_ms: clamp_ms(ms),
            ..self
        }
    }

    pub fn with_decay_ms(self, ms: u32) -> Self {
        Self {
            decay_ms: clamp_ms(ms),
            ..self
        }
    }

    pub fn with_sustain(self, level: f64) -> Self {
        Self {
            sustain: clamp_sustain(level),
            ..self
        }
    }

    pub fn with_release_ms(self, ms: u32) -> Self {
        Self {
            release_ms: clamp_ms(ms),
            ..self
        }
    }
}

/// Sample counts and per-sample slopes derived from [`EnvelopeSettings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTiming {
    pub attack_count: u32,
    pub attack_slope: f64,
    pub decay_count: u32,
    pub decay_slope: f64,
    pub sustain: f64,
    pub release_count: u32,
    pub release_slope: f64,
    /// Unrounded release length, for release slopes that start below sustain
    pub release_samples: f64,
}

/// Length of a stage in samples, before truncation
fn stage_samples(ms: u32, sample_rate: f64) -> f64 {
    ms as f64 * sample_rate / 1000.0
}

impl EnvelopeTiming {
    /// Decay and release slopes both depend on the sustain level, so the
    /// whole timing is always derived together.
    pub fn new(settings: &EnvelopeSettings, sample_rate: f64) -> Self {
        let attack = stage_samples(settings.attack_ms, sample_rate);
        let decay = stage_samples(settings.decay_ms, sample_rate);
        let release = stage_samples(settings.release_ms, sample_rate);
        let sustain = settings.sustain;

        Self {
            attack_count: attack as u32,
            attack_slope: 1.0 / attack,
            decay_count: decay as u32,
            decay_slope: (1.0 - sustain) / decay,
            sustain,
            release_count: release as u32,
            release_slope: sustain / release,
            release_samples: release,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct VoiceEnvelope {
    stage: EnvelopeStage,
    /// Samples elapsed in the current stage
    progress: u32,
    /// Last value returned by `tick`
    level: f64,
    /// Level and slope this voice's release runs from
    release_start: f64,
    release_slope: f64,
    note_on: bool,
    note_off: bool,
}

impl VoiceEnvelope {
    const IDLE: VoiceEnvelope = VoiceEnvelope {
        stage: EnvelopeStage::Idle,
        progress: 0,
        level: 0.0,
        release_start: 0.0,
        release_slope: 0.0,
        note_on: false,
        note_off: false,
    };

    fn cancel(&mut self) -> f64 {
        self.note_on = false;
        self.note_off = false;
        self.stage = EnvelopeStage::Idle;
        0.0
    }

    fn step(&mut self, t: &EnvelopeTiming) -> f64 {
        match self.stage {
            EnvelopeStage::Idle => {
                if self.note_on {
                    self.note_on = false;
                    self.progress = 0;
                    self.stage = EnvelopeStage::Attack;
                } else {
                    // A release for a silent voice has nothing to act on
                    self.note_off = false;
                }
                0.0
            }
            _ if self.note_on => self.cancel(),
            EnvelopeStage::Attack => {
                let value = self.progress as f64 * t.attack_slope;
                if self.progress >= t.attack_count {
                    self.progress = 0;
                    self.stage = EnvelopeStage::Decay;
                } else {
                    self.progress += 1;
                }
                value
            }
            EnvelopeStage::Decay => {
                let value = 1.0 - self.progress as f64 * t.decay_slope;
                if self.progress >= t.decay_count {
                    self.stage = EnvelopeStage::Sustain;
                } else {
                    self.progress += 1;
                }
                value
            }
            EnvelopeStage::Sustain => {
                if self.note_off {
                    self.note_off = false;
                    self.progress = 0;
                    self.release_start = t.sustain;
                    self.release_slope = t.release_slope;
                    self.stage = EnvelopeStage::Release;
                }
                t.sustain
            }
            EnvelopeStage::Release => {
                let value =
                    (self.release_start - self.progress as f64 * self.release_slope).max(0.0);
                if self.progress >= t.release_count {
                    self.stage = EnvelopeStage::Idle;
                } else {
                    self.progress += 1;
                }
                value
            }
        }
    }

    /// Move the stage counter so the voice carries on from its current
    /// level under new timing
    fn rebase(&mut self, old: &EnvelopeTiming, new: &EnvelopeTiming) {
        match self.stage {
            EnvelopeStage::Attack if old.attack_count != new.attack_count => {
                self.progress = ((self.level / new.attack_slope) as u32).min(new.attack_count);
            }
            EnvelopeStage::Decay
                if old.decay_count != new.decay_count || old.sustain != new.sustain =>
            {
                let elapsed = if new.decay_slope > 0.0 {
                    ((1.0 - self.level) / new.decay_slope) as u32
                } else {
                    self.progress
                };
                self.progress = elapsed.min(new.decay_count);
            }
            EnvelopeStage::Release
                if old.release_count != new.release_count || old.sustain != new.sustain =>
            {
                self.progress = 0;
                self.release_start = self.level;
                self.release_slope = self.level / new.release_samples;
            }
            _ => {}
        }
    }
}

/// Envelope state machines for every voice
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    sample_rate: f64,
    settings: EnvelopeSettings,
    timing: EnvelopeTiming,
    voices: [VoiceEnvelope; NUM_VOICES],
}

impl EnvelopeGenerator {
    pub fn new(settings: EnvelopeSettings, sample_rate: f64) -> Self {
        let settings = settings.clamped();
        Self {
            sample_rate,
            settings,
            timing: EnvelopeTiming::new(&settings, sample_rate),
            voices: [VoiceEnvelope::IDLE; NUM_VOICES],
        }
    }

    /// Flag a note-on; supersedes any note-off not yet observed
    pub fn note_on(&mut self, voice: usize) {
        let v = &mut self.voices[voice];
        v.note_on = true;
        v.note_off = false;
    }

    /// Flag a note-off; observed once the voice reaches Sustain
    pub fn note_off(&mut self, voice: usize) {
        self.voices[voice].note_off = true;
    }

    /// Advance one voice by one sample and return its gain in [0, 1]
    pub fn tick(&mut self, voice: usize) -> f64 {
        let v = &mut self.voices[voice];
        v.level = v.step(&self.timing);
        v.level
    }

    pub fn stage(&self, voice: usize) -> EnvelopeStage {
        self.voices[voice].stage
    }

    pub fn is_idle(&self, voice: usize) -> bool {
        self.voices[voice].stage == EnvelopeStage::Idle
    }

    /// Voices that can be non-silent during the next block: every voice
    /// not Idle, plus Idle voices with a note-on waiting to be observed
    pub fn sounding_voices(&self) -> VoiceMask {
        (0..NUM_VOICES)
            .filter(|&v| {
                let voice = &self.voices[v];
                voice.stage != EnvelopeStage::Idle || voice.note_on
            })
            .collect()
    }

    /// Force every voice to Idle and drop pending events
    pub fn silence_all(&mut self) {
        self.voices = [VoiceEnvelope::IDLE; NUM_VOICES];
    }

    pub fn settings(&self) -> EnvelopeSettings {
        self.settings
    }

    pub fn timing(&self) -> &EnvelopeTiming {
        &self.timing
    }

    /// Replace all parameters at once
    /// Sounding voices continue from their current level, and a release
    /// never rises because the sustain level went up.
    pub fn apply_settings(&mut self, settings: EnvelopeSettings) {
        let old = self.timing;
        self.settings = settings.clamped();
        self.timing = EnvelopeTiming::new(&self.settings, self.sample_rate);
        for voice in self.voices.iter_mut() {
            voice.rebase(&old, &self.timing);
        }
    }

    pub fn set_attack_time_ms(&mut self, ms: u32) {
        self.apply_settings(self.settings.with_attack_ms(ms));
    }

    pub fn set_decay_time_ms(&mut self, ms: u32) {
        self.apply_settings(self.settings.with_decay_ms(ms));
    }

    /// Also re-derives the decay and release slopes
    pub fn set_sustain_level(&mut self, level: f64) {
        self.apply_settings(self.settings.with_sustain(level));
    }

    pub fn set_release_time_ms(&mut self, ms: u32) {
        self.apply_settings(self.settings.with_release_ms(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn generator(attack: u32, decay: u32, sustain: f64, release: u32) -> EnvelopeGenerator {
        EnvelopeGenerator::new(EnvelopeSettings::new(attack, decay, sustain, release), SR)
    }

    #[test]
    fn test_starts_idle_and_silent() {
        let mut env = generator(10, 10, 0.5, 10);
        for voice in 0..NUM_VOICES {
            assert!(env.is_idle(voice));
            assert_eq!(env.tick(voice), 0.0);
        }
        assert!(env.sounding_voices().is_empty());
    }

    #[test]
    fn test_attack_is_linear_over_computed_count() {
        let mut env = generator(1000, 10, 0.5, 10);
        assert_eq!(env.timing().attack_count, 44100);

        env.note_on(0);
        // Idle tick consumes the event
        assert_eq!(env.tick(0), 0.0);
        assert_eq!(env.stage(0), EnvelopeStage::Attack);

        for n in 0..=44100u32 {
            let value = env.tick(0);
            let expected = n as f64 / 44100.0;
            assert!(
                (value - expected).abs() < 1e-9,
                "attack sample {}: expected {}, got {}",
                n,
                expected,
                value
            );
        }
        assert_eq!(env.stage(0), EnvelopeStage::Decay);
    }

    #[test]
    fn test_decay_settles_on_sustain() {
        let mut env = generator(1, 10, 0.25, 10);
        env.note_on(3);
        let mut last = 0.0;
        for _ in 0..2000 {
            last = env.tick(3);
        }
        assert_eq!(env.stage(3), EnvelopeStage::Sustain);
        assert!((last - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_release_is_monotonic_and_ends_idle() {
        let mut env = generator(1, 1, 0.7, 50);
        env.note_on(5);
        for _ in 0..500 {
            env.tick(5);
        }
        env.note_off(5);

        let mut previous = f64::INFINITY;
        let mut saw_release = false;
        for _ in 0..5000 {
            let value = env.tick(5);
            assert!((0.0..=1.0).contains(&value));
            if env.stage(5) == EnvelopeStage::Release {
                saw_release = true;
            }
            if saw_release {
                assert!(value <= previous, "release rose from {} to {}", previous, value);
                previous = value;
            }
        }
        assert!(saw_release);
        assert!(env.is_idle(5));
    }

    #[test]
    fn test_note_on_cancels_active_voice() {
        for ticks_before in [10usize, 100, 1000] {
            // 1 ms attack is 44 samples, 1 ms decay the same
            let mut env = generator(1, 1, 0.5, 100);
            env.note_on(7);
            for _ in 0..ticks_before {
                env.tick(7);
            }
            assert!(!env.is_idle(7));

            env.note_on(7);
            assert_eq!(env.tick(7), 0.0);
            assert!(env.is_idle(7));
            // Flag was consumed: the voice stays silent
            assert_eq!(env.tick(7), 0.0);
            assert!(env.is_idle(7));
        }
    }

    #[test]
    fn test_note_on_during_release_cancels() {
        let mut env = generator(1, 1, 0.5, 1000);
        env.note_on(0);
        for _ in 0..200 {
            env.tick(0);
        }
        env.note_off(0);
        env.tick(0);
        env.tick(0);
        assert_eq!(env.stage(0), EnvelopeStage::Release);
        env.note_on(0);
        assert_eq!(env.tick(0), 0.0);
        assert!(env.is_idle(0));
    }

    #[test]
    fn test_early_note_off_waits_for_sustain() {
        let mut env = generator(10, 10, 0.5, 10);
        env.note_on(2);
        env.note_off(2);
        // Attack (441) + decay (441) before the release can start
        for _ in 0..800 {
            env.tick(2);
            assert_ne!(env.stage(2), EnvelopeStage::Release);
        }
        for _ in 0..200 {
            env.tick(2);
        }
        assert_eq!(env.stage(2), EnvelopeStage::Release);
    }

    #[test]
    fn test_stale_note_off_is_discarded_while_idle() {
        let mut env = generator(1, 1, 0.5, 1);
        env.note_off(1);
        env.tick(1);
        env.note_on(1);
        for _ in 0..500 {
            env.tick(1);
        }
        assert_eq!(env.stage(1), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_repeated_events_collapse() {
        let mut env = generator(1, 1, 0.5, 1);
        env.note_on(4);
        env.note_on(4);
        env.note_on(4);
        env.tick(4);
        assert_eq!(env.stage(4), EnvelopeStage::Attack);
        env.tick(4);
        assert_eq!(env.stage(4), EnvelopeStage::Attack);
    }

    #[test]
    fn test_voices_are_independent() {
        let mut env = generator(1, 1, 0.5, 1);
        env.note_on(0);
        // Pending note-on already counts as sounding
        assert_eq!(env.sounding_voices().iter().collect::<Vec<_>>(), vec![0]);
        env.tick(0);
        env.tick(1);
        assert_eq!(env.stage(0), EnvelopeStage::Attack);
        assert!(env.is_idle(1));
        assert_eq!(env.sounding_voices().iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_setters_clamp() {
        let mut env = generator(10, 10, 0.5, 10);
        env.set_attack_time_ms(0);
        env.set_decay_time_ms(60_000);
        env.set_sustain_level(1.5);
        env.set_release_time_ms(3);
        let s = env.settings();
        assert_eq!(s.attack_ms, MS_MIN);
        assert_eq!(s.decay_ms, MS_MAX);
        assert_eq!(s.sustain, 1.0);
        assert_eq!(s.release_ms, 3);
        env.set_sustain_level(-2.0);
        assert_eq!(env.settings().sustain, 0.0);
    }

    #[test]
    fn test_sustain_change_recomputes_slopes() {
        let mut env = generator(10, 100, 0.5, 200);
        let before = *env.timing();
        env.set_sustain_level(0.8);
        let after = *env.timing();
        assert_eq!(before.decay_count, after.decay_count);
        assert!((after.decay_slope - 0.2 / 4410.0).abs() < 1e-15);
        assert!((after.release_slope - 0.8 / 8820.0).abs() < 1e-15);
        assert!(after.decay_slope < before.decay_slope);
        assert!(after.release_slope > before.release_slope);
    }

    #[test]
    fn test_shorter_attack_mid_ramp_continues_from_level() {
        let mut env = generator(5000, 100, 0.5, 100);
        env.note_on(0);
        let mut level = 0.0;
        for _ in 0..10_001 {
            level = env.tick(0);
        }
        env.set_attack_time_ms(1);
        let next = env.tick(0);
        assert!(next <= level, "{} after {}", next, level);
        for _ in 0..100 {
            assert!((0.0..=1.0).contains(&env.tick(0)));
        }
        assert_ne!(env.stage(0), EnvelopeStage::Attack);
    }

    #[test]
    fn test_shorter_decay_mid_ramp_stays_above_sustain() {
        let mut env = generator(1, 5000, 0.2, 100);
        env.note_on(0);
        for _ in 0..10_000 {
            env.tick(0);
        }
        assert_eq!(env.stage(0), EnvelopeStage::Decay);
        env.set_decay_time_ms(1);
        for _ in 0..100 {
            let value = env.tick(0);
            assert!((0.2..=1.0).contains(&value), "decay left range: {}", value);
        }
        assert_eq!(env.stage(0), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_raising_sustain_mid_release_does_not_rise() {
        let mut env = generator(1, 1, 0.2, 100);
        env.note_on(0);
        for _ in 0..500 {
            env.tick(0);
        }
        env.note_off(0);
        let mut previous = 0.0;
        for _ in 0..100 {
            previous = env.tick(0);
        }
        assert_eq!(env.stage(0), EnvelopeStage::Release);

        env.set_sustain_level(1.0);
        env.set_release_time_ms(5);
        while !env.is_idle(0) {
            let value = env.tick(0);
            assert!(value <= previous, "release rose from {} to {}", previous, value);
            previous = value;
        }
        assert!(previous < 0.01);
    }

    #[test]
    fn test_output_always_in_unit_range() {
        let mut env = generator(5, 7, 0.3, 11);
        for cycle in 0..5 {
            env.note_on(9);
            for n in 0..2000 {
                if n == 600 + cycle * 50 {
                    env.note_off(9);
                }
                let value = env.tick(9);
                assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
            }
        }
    }
}
