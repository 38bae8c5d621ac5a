//! cpal-backed audio output.
//!
//! The cpal stream is not `Send`, so a dedicated thread owns it and the sink
//! talks to the data callback through shared state. The callback mixes active
//! buffers sample-by-sample and drives the sink clock; dropping the sink drops
//! the channel the thread parks on, which tears the stream down.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

use crate::audio::AudioChunk;
use crate::scheduler::{AudioSink, BufferId};

pub struct CpalSink {
    shared: Arc<Mutex<CpalShared>>,
    sample_rate: u32,
    _stop_tx: mpsc::Sender<()>,
}

#[derive(Default)]
struct CpalShared {
    clock: f64,
    active: Vec<ActiveBuffer>,
    finished: Vec<BufferId>,
}

struct ActiveBuffer {
    id: BufferId,
    start: f64,
    samples: Vec<f32>,
    pos: usize,
}

impl CpalSink {
    /// Open the default output device. Fails when there is no device or its
    /// format is unsupported.
    pub fn new() -> anyhow::Result<Self> {
        let shared = Arc::new(Mutex::new(CpalShared::default()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<u32>>();

        let callback_shared = shared.clone();
        std::thread::spawn(move || match build_stream(callback_shared) {
            Ok((stream, rate)) => {
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(rate));
                // Park until the sink drops, then the stream drops with us
                let _ = stop_rx.recv();
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("audio thread exited before opening a stream"))??;

        Ok(Self {
            shared,
            sample_rate,
            _stop_tx: stop_tx,
        })
    }
}

fn build_stream(shared: Arc<Mutex<CpalShared>>) -> anyhow::Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no audio output device"))?;
    let config = device.default_output_config()?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported sample format {:?}", config.sample_format());
    }

    let rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_config: cpal::StreamConfig = config.into();
    let step = 1.0 / rate as f64;

    let stream = device.build_output_stream(
        &stream_config,
        move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut state = shared.lock().unwrap();
            let mut clock = state.clock;

            for frame in out.chunks_mut(channels) {
                let mut mixed = 0.0f32;
                for buffer in state.active.iter_mut() {
                    if buffer.start > clock {
                        continue;
                    }
                    if let Some(&sample) = buffer.samples.get(buffer.pos) {
                        mixed += sample;
                        buffer.pos += 1;
                    }
                }
                let mixed = mixed.clamp(-1.0, 1.0);
                for slot in frame.iter_mut() {
                    *slot = mixed;
                }
                clock += step;
            }

            state.clock = clock;
            let (ended, still): (Vec<_>, Vec<_>) = state
                .active
                .drain(..)
                .partition(|b| b.pos >= b.samples.len());
            state.active = still;
            state.finished.extend(ended.iter().map(|b| b.id));
        },
        move |err| warn!(%err, "Audio stream error"),
        None,
    )?;

    Ok((stream, rate))
}

/// Convert 16-bit PCM to f32 at the device rate with linear interpolation.
fn resample_to_f32(samples: &[i16], from: u32, to: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    if from == to {
        return samples.iter().map(|&s| s as f32 / 32768.0).collect();
    }

    let ratio = from as f64 / to as f64;
    let out_len = (samples.len() as f64 / ratio).ceil() as usize;
    let last = samples.len() - 1;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let index = pos as usize;
        let frac = pos - index as f64;
        let a = samples[index.min(last)] as f64;
        let b = samples[(index + 1).min(last)] as f64;
        out.push(((a + (b - a) * frac) / 32768.0) as f32);
    }
    out
}

impl AudioSink for CpalSink {
    fn now(&self) -> f64 {
        self.shared.lock().unwrap().clock
    }

    fn play_at(&mut self, id: BufferId, chunk: AudioChunk, at: f64) -> anyhow::Result<()> {
        let samples = resample_to_f32(&chunk.samples, chunk.sample_rate, self.sample_rate);
        self.shared.lock().unwrap().active.push(ActiveBuffer {
            id,
            start: at,
            samples,
            pos: 0,
        });
        Ok(())
    }

    fn stop(&mut self, id: BufferId) {
        self.shared.lock().unwrap().active.retain(|b| b.id != id);
    }

    fn take_finished(&mut self) -> Vec<BufferId> {
        std::mem::take(&mut self.shared.lock().unwrap().finished)
    }
}
