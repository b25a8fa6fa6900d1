//! Synthesizer engine context
//!
//! [`SynthEngine`] owns the whole signal chain and its buffer:
//!
//! ```text
//! Mixer -> Vca (envelopes) -> OscillatorBank
//! ```
//!
//! Built once with [`SynthEngine::new`], which also hands back the
//! [`Controller`] for the control thread. After that, [`SynthEngine::process`]
//! renders one block per call on the audio thread without allocating.
//! Before pulling, each block picks up the latest published tuning and
//! envelope snapshots and drains pending note events.

use crate::buffer::{PcmBuffer, MASTER_CHANNEL};
use crate::config::EngineConfig;
use crate::control::{ControlEvent, Controller, SharedState};
use crate::envelope::{EnvelopeGenerator, EnvelopeSettings};
use crate::error::SynthResult;
use crate::mixer::Mixer;
use crate::oscillator::OscillatorBank;
use crate::source::{SampleSource, VoiceMask};
use crate::tuning::{compute_frequencies, FrequencyTable};
use crate::vca::Vca;
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapRb};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The composed pull chain
pub type SignalChain = Mixer<Vca<OscillatorBank>>;

/// Counters shared between the audio thread and observers
#[derive(Debug, Default)]
pub struct PlaybackStats {
    buffers_rendered: AtomicU64,
    underruns: AtomicU64,
    last_render_us: AtomicU64,
}

/// Point-in-time copy of [`PlaybackStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub buffers_rendered: u64,
    pub underruns: u64,
    pub last_render_us: u64,
}

impl PlaybackStats {
    /// Record one rendered block. Returns the running underrun count if the
    /// block missed its deadline.
    pub fn record_buffer(&self, elapsed: Duration, deadline: Duration) -> Option<u64> {
        self.buffers_rendered.fetch_add(1, Ordering::Relaxed);
        self.last_render_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        if elapsed > deadline {
            Some(self.record_underrun())
        } else {
            None
        }
    }

    /// Count an underrun seen by the playback side; returns the new total
    pub fn record_underrun(&self) -> u64 {
        self.underruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn buffers_rendered(&self) -> u64 {
        self.buffers_rendered.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn last_render_us(&self) -> u64 {
        self.last_render_us.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_rendered: self.buffers_rendered(),
            underruns: self.underruns(),
            last_render_us: self.last_render_us(),
        }
    }
}

pub struct SynthEngine {
    sample_rate: u32,
    chain: SignalChain,
    buffer: PcmBuffer,
    events: HeapCons<ControlEvent>,
    shared: Arc<SharedState>,
    /// Snapshots currently applied to the chain
    applied_table: Arc<FrequencyTable>,
    applied_envelope: Arc<EnvelopeSettings>,
    deadline: Duration,
}

impl SynthEngine {
    /// Validate `config`, build the chain and allocate every buffer
    pub fn new(config: &EngineConfig) -> SynthResult<(SynthEngine, Controller)> {
        config.validate()?;

        let table = compute_frequencies(config.tuning, config.base_note)?;
        let envelope = config.envelope.clamped();
        let sample_rate = config.sample_rate_hz();

        let shared = Arc::new(SharedState::new(table, envelope));
        let applied_table = shared.frequencies.load_full();
        let applied_envelope = shared.envelope.load_full();

        let oscillator = OscillatorBank::new(sample_rate, config.harmonic_set()?, &applied_table);
        let vca = Vca::new(oscillator, EnvelopeGenerator::new(envelope, sample_rate));
        let chain = Mixer::new(vca, config.mix_mode);

        let (producer, consumer) = HeapRb::<ControlEvent>::new(config.event_queue_capacity).split();

        info!(
            "Engine ready: {} Hz, {} samples per buffer, {} tuning, {} mix",
            config.sample_rate, config.samples_per_buffer, applied_table.system(), config.mix_mode
        );
        debug!("Harmonic weights: {:?}", config.harmonics);

        let engine = SynthEngine {
            sample_rate: config.sample_rate,
            chain,
            buffer: PcmBuffer::new(config.samples_per_buffer),
            events: consumer,
            shared: Arc::clone(&shared),
            applied_table,
            applied_envelope,
            deadline: config.buffer_duration(),
        };
        Ok((engine, Controller::new(producer, shared)))
    }

    /// Adopt any tuning or envelope snapshot published since the last block
    fn apply_published_state(&mut self) {
        let table = self.shared.frequencies.load();
        if !Arc::ptr_eq(&table, &self.applied_table) {
            self.chain.source_mut().source_mut().set_frequencies(&table);
            self.applied_table = Arc::clone(&table);
        }

        let envelope = self.shared.envelope.load();
        if !Arc::ptr_eq(&envelope, &self.applied_envelope) {
            self.chain.source_mut().envelope_mut().apply_settings(**envelope);
            self.applied_envelope = Arc::clone(&envelope);
        }
    }

    fn drain_events(&mut self) {
        let envelope = self.chain.source_mut().envelope_mut();
        while let Some(event) = self.events.try_pop() {
            match event {
                ControlEvent::NoteOn(voice) => envelope.note_on(voice),
                ControlEvent::NoteOff(voice) => envelope.note_off(voice),
            }
        }
    }

    /// Render one block into the engine buffer; returns samples per channel
    pub fn process(&mut self) -> usize {
        let started = Instant::now();

        self.apply_published_state();
        self.drain_events();
        let produced = self.chain.pull(&mut self.buffer, VoiceMask::ALL);

        // Counted only; the control side logs them
        self.shared.stats.record_buffer(started.elapsed(), self.deadline);
        produced
    }

    /// Render `buffers` blocks and collect the master channel
    pub fn render(&mut self, buffers: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(buffers * self.samples_per_buffer());
        for _ in 0..buffers {
            self.process();
            out.extend(self.master_samples());
        }
        out
    }

    pub fn buffer(&self) -> &PcmBuffer {
        &self.buffer
    }

    /// Master channel of the last rendered block
    pub fn master_samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.buffer.channel_samples(MASTER_CHANNEL)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples_per_buffer(&self) -> usize {
        self.buffer.samples_per_buffer()
    }

    /// Frequency table the oscillators are currently running from
    pub fn frequency_table(&self) -> &FrequencyTable {
        &self.applied_table
    }

    pub fn envelope(&self) -> &EnvelopeGenerator {
        self.chain.source().envelope()
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.shared.stats
    }

    /// Silence every voice and drop queued events
    pub fn shutdown(&mut self) {
        while self.events.try_pop().is_some() {}
        self.chain.source_mut().envelope_mut().silence_all();
        self.buffer.clear();

        let stats = self.shared.stats.snapshot();
        info!(
            "Engine stopped after {} buffers ({} underruns)",
            stats.buffers_rendered, stats.underruns
        );
    }
}
