//! Control surface
//!
//! [`Controller`] is the handle a UI or input thread uses to play and
//! configure the engine. Nothing here ever blocks the audio thread:
//!
//! - Note events go through a bounded SPSC ring buffer that the engine
//!   drains once per block.
//! - Tuning and envelope parameters are published as whole snapshots
//!   through `ArcSwap`; the engine picks up the latest one per block.

use crate::engine::PlaybackStats;
use crate::envelope::EnvelopeSettings;
use crate::error::{SynthError, SynthResult};
use crate::intervals::{cents_matrix, CentsMatrix};
use crate::ratio::Ratio;
use crate::tuning::{compute_frequencies, interval_ratios, note_name, FrequencyTable, TuningSystem};
use crate::NUM_VOICES;
use arc_swap::ArcSwap;
use ringbuf::traits::{Observer, Producer};
use ringbuf::HeapProd;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Note event sent from the control thread to the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    NoteOn(usize),
    NoteOff(usize),
}

impl ControlEvent {
    pub fn voice(self) -> usize {
        match self {
            ControlEvent::NoteOn(voice) | ControlEvent::NoteOff(voice) => voice,
        }
    }
}

/// State published by the control thread and read by the engine
pub(crate) struct SharedState {
    pub(crate) frequencies: ArcSwap<FrequencyTable>,
    pub(crate) envelope: ArcSwap<EnvelopeSettings>,
    pub(crate) stats: PlaybackStats,
}

impl SharedState {
    pub(crate) fn new(table: FrequencyTable, envelope: EnvelopeSettings) -> Self {
        Self {
            frequencies: ArcSwap::from_pointee(table),
            envelope: ArcSwap::from_pointee(envelope),
            stats: PlaybackStats::default(),
        }
    }
}

/// Control-thread handle to a running engine
pub struct Controller {
    events: HeapProd<ControlEvent>,
    shared: Arc<SharedState>,
    /// Underrun total at the last `report_underruns`
    reported_underruns: u64,
}

fn check_voice(voice: usize) -> SynthResult<()> {
    if voice < NUM_VOICES {
        Ok(())
    } else {
        Err(SynthError::InvalidVoice(voice))
    }
}

impl Controller {
    pub(crate) fn new(events: HeapProd<ControlEvent>, shared: Arc<SharedState>) -> Self {
        Self {
            events,
            shared,
            reported_underruns: 0,
        }
    }

    fn send(&mut self, event: ControlEvent) -> SynthResult<()> {
        check_voice(event.voice())?;
        self.events
            .try_push(event)
            .map_err(|_| SynthError::EventQueueFull)?;
        debug!("Queued {:?}", event);
        Ok(())
    }

    /// Start a note. Cancels the voice instead if it is already sounding.
    pub fn note_on(&mut self, voice: usize) -> SynthResult<()> {
        self.send(ControlEvent::NoteOn(voice))
    }

    /// Release a note once it has reached its sustain stage
    pub fn note_off(&mut self, voice: usize) -> SynthResult<()> {
        self.send(ControlEvent::NoteOff(voice))
    }

    /// Free slots left in the event queue
    pub fn queue_vacancy(&self) -> usize {
        self.events.vacant_len()
    }

    fn update_envelope(&self, f: impl Fn(EnvelopeSettings) -> EnvelopeSettings) {
        let previous = self.shared.envelope.rcu(|current| f(**current));
        debug!(
            "Envelope {:?} -> {:?}",
            *previous,
            **self.shared.envelope.load()
        );
    }

    /// Clamped to 1..=5000 ms
    pub fn set_attack_time_ms(&self, ms: u32) {
        self.update_envelope(|s| s.with_attack_ms(ms));
    }

    /// Clamped to 1..=5000 ms
    pub fn set_decay_time_ms(&self, ms: u32) {
        self.update_envelope(|s| s.with_decay_ms(ms));
    }

    /// Clamped to 0..=1
    pub fn set_sustain_level(&self, level: f64) {
        self.update_envelope(|s| s.with_sustain(level));
    }

    /// Clamped to 1..=5000 ms
    pub fn set_release_time_ms(&self, ms: u32) {
        self.update_envelope(|s| s.with_release_ms(ms));
    }

    pub fn set_envelope(&self, settings: EnvelopeSettings) {
        self.update_envelope(|_| settings.clamped());
    }

    pub fn envelope_settings(&self) -> EnvelopeSettings {
        **self.shared.envelope.load()
    }

    /// Compute a new frequency table and publish it as one swap
    pub fn set_tuning(&self, system: TuningSystem, base_note: usize) -> SynthResult<()> {
        let table = compute_frequencies(system, base_note)?;
        info!(
            "Tuning set to {} on {} (A4 = {:.2} Hz)",
            system,
            note_name(base_note),
            table.reference_a4()
        );
        self.shared.frequencies.store(Arc::new(table));
        Ok(())
    }

    pub fn current_tuning(&self) -> (TuningSystem, usize) {
        let table = self.shared.frequencies.load();
        (table.system(), table.base_note())
    }

    /// Snapshot of the published frequency table
    pub fn get_frequencies(&self) -> Arc<FrequencyTable> {
        self.shared.frequencies.load_full()
    }

    pub fn get_interval_ratios(&self, system: TuningSystem) -> SynthResult<[Ratio; 12]> {
        interval_ratios(system)
    }

    /// Cents between all pitch-class pairs of the current tuning
    pub fn interval_cents(&self) -> CentsMatrix {
        cents_matrix(&self.shared.frequencies.load())
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.shared.stats
    }

    /// Log underruns counted since the previous call and return how many.
    /// Meant to be polled from the control thread so the audio thread
    /// never touches the log sink.
    pub fn report_underruns(&mut self) -> u64 {
        let total = self.shared.stats.underruns();
        let new = total - self.reported_underruns;
        if new > 0 {
            warn!("Audio underruns: {} new, {} total", new, total);
            self.reported_underruns = total;
        }
        new
    }
}
