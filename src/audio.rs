//! Real-time audio output using cpal
//! Works with JACK, ALSA, CoreAudio, WASAPI, etc.
//!
//! The engine renders fixed-size blocks while the device asks for whatever
//! frame count it likes, so the callback walks the master channel of the
//! current block and renders the next one when it runs out. The mono
//! master signal is written to every device channel.

use crate::engine::SynthEngine;
use crate::error::{SynthError, SynthResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

fn audio_err(e: impl std::fmt::Display) -> SynthError {
    SynthError::Audio(e.to_string())
}

/// Feeds device frames from engine blocks
struct BlockReader {
    engine: SynthEngine,
    position: usize,
}

impl BlockReader {
    fn new(engine: SynthEngine) -> Self {
        let position = engine.samples_per_buffer();
        Self { engine, position }
    }

    fn next_sample(&mut self) -> f32 {
        if self.position >= self.engine.samples_per_buffer() {
            self.engine.process();
            self.position = 0;
        }
        let sample = self
            .engine
            .buffer()
            .sample(crate::buffer::MASTER_CHANNEL, self.position);
        self.position += 1;
        sample as f32 / 32768.0
    }

    fn fill<T>(&mut self, output: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        for frame in output.chunks_mut(channels) {
            let value = T::from_sample(self.next_sample());
            for channel in frame.iter_mut() {
                *channel = value;
            }
        }
    }
}

/// A running output stream driving a [`SynthEngine`]
pub struct AudioOutput {
    sample_rate: u32,
    channels: usize,
    stream: cpal::Stream,
}

impl AudioOutput {
    /// Open the default output device and start pulling blocks from `engine`
    pub fn start(engine: SynthEngine) -> SynthResult<Self> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| SynthError::Audio("No audio output device found".to_string()))?;
        info!("Audio device: {}", device.name().map_err(audio_err)?);

        let supported = device.default_output_config().map_err(audio_err)?;
        let channels = supported.channels() as usize;
        let sample_rate = engine.sample_rate();
        if supported.sample_rate().0 != sample_rate {
            warn!(
                "Device prefers {} Hz, requesting {} Hz",
                supported.sample_rate().0,
                sample_rate
            );
        }

        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let reader = BlockReader::new(engine);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, reader, channels),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, reader, channels),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, reader, channels),
            other => {
                return Err(SynthError::Audio(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }?;

        stream.play().map_err(audio_err)?;
        info!("Audio stream started at {} Hz, {} channels", sample_rate, channels);

        Ok(Self {
            sample_rate,
            channels,
            stream,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut reader: BlockReader,
        channels: usize,
    ) -> SynthResult<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    reader.fill(data, channels);
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(audio_err)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Pause and close the stream
    pub fn stop(self) -> SynthResult<()> {
        self.stream.pause().map_err(audio_err)?;
        info!("Audio stream stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::envelope::EnvelopeSettings;

    #[test]
    fn test_reader_spans_block_boundaries() {
        let config = EngineConfig {
            samples_per_buffer: 16,
            envelope: EnvelopeSettings::new(1, 1, 1.0, 1),
            ..EngineConfig::default()
        };
        let (engine, mut ctl) = SynthEngine::new(&config).unwrap();
        ctl.note_on(12).unwrap();
        let mut reader = BlockReader::new(engine);

        // Stereo, 40 frames = two and a half blocks
        let mut out = vec![0.0f32; 80];
        reader.fill(&mut out, 2);

        assert_eq!(reader.engine.stats().buffers_rendered(), 3);
        assert_eq!(reader.position, 8);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
            assert!((-1.0..1.0).contains(&frame[0]));
        }
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_integer_formats() {
        let (engine, _ctl) = SynthEngine::new(&EngineConfig::default()).unwrap();
        let mut reader = BlockReader::new(engine);
        let mut out = vec![1i16; 8];
        reader.fill(&mut out, 1);
        assert!(out.iter().all(|&s| s == 0));

        let mut out = vec![0u16; 8];
        reader.fill(&mut out, 1);
        assert!(out.iter().all(|&s| s == 32768));
    }
}
