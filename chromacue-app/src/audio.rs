//! Alerting-tone playback over a persistent cpal output stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

/// Plays short sine tones. The stream stays open for the whole run; `play`
/// arms the callback through atomics, so tone onset never waits on stream
/// startup. Machines without an output device get a silent player and a
/// warning, not a failed run.
pub struct TonePlayer {
    _stream: Option<cpal::Stream>,
    sample_rate: f32,
    remaining: Arc<AtomicU64>,
    freq_bits: Arc<AtomicU32>,
    volume_bits: Arc<AtomicU32>,
}

impl TonePlayer {
    pub fn new() -> Self {
        let remaining = Arc::new(AtomicU64::new(0));
        let freq_bits = Arc::new(AtomicU32::new(440.0f32.to_bits()));
        let volume_bits = Arc::new(AtomicU32::new(0.5f32.to_bits()));

        let (stream, sample_rate) =
            match Self::open_stream(&remaining, &freq_bits, &volume_bits) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "no audio output; tones will be silent");
                    (None, 44_100.0)
                }
            };

        Self {
            _stream: stream,
            sample_rate,
            remaining,
            freq_bits,
            volume_bits,
        }
    }

    fn open_stream(
        remaining: &Arc<AtomicU64>,
        freq_bits: &Arc<AtomicU32>,
        volume_bits: &Arc<AtomicU32>,
    ) -> anyhow::Result<(Option<cpal::Stream>, f32)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no default output device"))?;
        let supported = device.default_output_config()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let remaining = Arc::clone(remaining);
        let freq_bits = Arc::clone(freq_bits);
        let volume_bits = Arc::clone(volume_bits);
        let sr = sample_rate as f32;
        let mut phase = 0.0f32;

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let freq = f32::from_bits(freq_bits.load(Ordering::Relaxed));
                let volume = f32::from_bits(volume_bits.load(Ordering::Relaxed));
                let step = std::f32::consts::TAU * freq / sr;

                for frame in data.chunks_mut(channels) {
                    let s = if remaining.load(Ordering::Relaxed) > 0 {
                        remaining.fetch_sub(1, Ordering::Relaxed);
                        phase += step;
                        if phase > std::f32::consts::TAU {
                            phase -= std::f32::consts::TAU;
                        }
                        phase.sin() * volume
                    } else {
                        phase = 0.0;
                        0.0
                    };
                    for out in frame {
                        *out = s;
                    }
                }
            },
            |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        stream.play()?;
        Ok((Some(stream), sr))
    }

    pub fn play(&self, freq_hz: f32, duration_ms: u64, volume: f32) {
        self.freq_bits
            .store(freq_hz.to_bits(), Ordering::Relaxed);
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        let frames = (self.sample_rate as f64 * duration_ms as f64 / 1000.0) as u64;
        self.remaining.store(frames, Ordering::Relaxed);
    }
}
