//! Gapless audio playback scheduling.
//!
//! Chunks arrive faster than real time, so each one is scheduled at the later
//! of the write cursor and the sink clock, and the cursor advances by the
//! chunk's duration. Outstanding buffers sit in a bounded queue; an
//! interruption flushes the queue, stops every buffer, and snaps the cursor
//! back to the clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::audio::AudioChunk;

pub type BufferId = u64;

/// Playback capacity before [`PlaybackScheduler::schedule`] starts refusing
/// chunks.
pub const DEFAULT_QUEUE_CAP: usize = 64;

/// An audio output that plays buffers at absolute clock positions.
pub trait AudioSink: Send {
    /// Current position of the sink clock, in seconds.
    fn now(&self) -> f64;

    /// Start `chunk` at clock position `at`.
    fn play_at(&mut self, id: BufferId, chunk: AudioChunk, at: f64) -> anyhow::Result<()>;

    /// Stop a buffer early. Unknown ids are ignored.
    fn stop(&mut self, id: BufferId);

    /// Ids of buffers that have finished playing since the last call.
    fn take_finished(&mut self) -> Vec<BufferId>;
}

/// A buffer handed to the sink and not yet finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBuffer {
    pub id: BufferId,
    pub start: f64,
    pub duration: f64,
}

/// Bounded queue of outstanding buffers.
pub struct PlaybackQueue {
    buffers: VecDeque<ScheduledBuffer>,
    cap: usize,
}

impl PlaybackQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            buffers: VecDeque::new(),
            cap,
        }
    }

    pub fn push(&mut self, buffer: ScheduledBuffer) -> anyhow::Result<()> {
        if self.buffers.len() >= self.cap {
            anyhow::bail!("playback queue full ({} buffers)", self.cap);
        }
        self.buffers.push_back(buffer);
        Ok(())
    }

    pub fn remove(&mut self, id: BufferId) -> Option<ScheduledBuffer> {
        let index = self.buffers.iter().position(|b| b.id == id)?;
        self.buffers.remove(index)
    }

    /// Empty the queue, returning everything that was outstanding.
    pub fn flush(&mut self) -> Vec<ScheduledBuffer> {
        self.buffers.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffers.len() >= self.cap
    }
}

/// Schedules chunks back-to-back on an [`AudioSink`].
pub struct PlaybackScheduler<S: AudioSink> {
    sink: S,
    queue: PlaybackQueue,
    cursor: f64,
    next_id: BufferId,
}

impl<S: AudioSink> PlaybackScheduler<S> {
    pub fn new(sink: S) -> Self {
        Self::with_capacity(sink, DEFAULT_QUEUE_CAP)
    }

    pub fn with_capacity(sink: S, cap: usize) -> Self {
        Self {
            sink,
            queue: PlaybackQueue::new(cap),
            cursor: 0.0,
            next_id: 0,
        }
    }

    /// Queue a chunk for seamless playback after everything already queued.
    ///
    /// Fails when the queue is full; the chunk is not played and the cursor
    /// does not move.
    pub fn schedule(&mut self, chunk: AudioChunk) -> anyhow::Result<ScheduledBuffer> {
        self.reap();

        if self.queue.is_full() {
            anyhow::bail!("playback queue full ({} buffers)", self.queue.len());
        }

        let start = self.cursor.max(self.sink.now());
        let duration = chunk.duration_secs();
        let id = self.next_id;
        self.next_id += 1;

        self.sink.play_at(id, chunk, start)?;
        let buffer = ScheduledBuffer {
            id,
            start,
            duration,
        };
        self.queue.push(buffer)?;
        self.cursor = start + duration;
        Ok(buffer)
    }

    /// Stop everything outstanding and snap the cursor to the sink clock.
    /// The next chunk plays immediately.
    pub fn interrupt(&mut self) {
        for buffer in self.queue.flush() {
            self.sink.stop(buffer.id);
        }
        self.cursor = self.sink.now();
    }

    /// Drop queue entries for buffers the sink reports finished.
    pub fn reap(&mut self) {
        for id in self.sink.take_finished() {
            self.queue.remove(id);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.queue.len()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }
}

/// Deterministic sink driven by an explicit clock. Records calls instead of
/// making sound; clones share state so callers can inspect it after handing
/// the sink to a scheduler.
#[derive(Clone, Default)]
pub struct ManualSink {
    shared: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: f64,
    playing: Vec<ScheduledBuffer>,
    stopped: Vec<BufferId>,
    finished: Vec<BufferId>,
}

impl ManualSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward, finishing any buffer whose end has passed.
    pub fn advance(&self, secs: f64) {
        let mut state = self.shared.lock().unwrap();
        state.now += secs;
        let now = state.now;
        let (ended, still): (Vec<_>, Vec<_>) = state
            .playing
            .drain(..)
            .partition(|b| b.start + b.duration <= now);
        state.playing = still;
        state.finished.extend(ended.iter().map(|b| b.id));
    }

    pub fn playing(&self) -> Vec<ScheduledBuffer> {
        self.shared.lock().unwrap().playing.clone()
    }

    pub fn stopped(&self) -> Vec<BufferId> {
        self.shared.lock().unwrap().stopped.clone()
    }
}

impl AudioSink for ManualSink {
    fn now(&self) -> f64 {
        self.shared.lock().unwrap().now
    }

    fn play_at(&mut self, id: BufferId, chunk: AudioChunk, at: f64) -> anyhow::Result<()> {
        self.shared.lock().unwrap().playing.push(ScheduledBuffer {
            id,
            start: at,
            duration: chunk.duration_secs(),
        });
        Ok(())
    }

    fn stop(&mut self, id: BufferId) {
        let mut state = self.shared.lock().unwrap();
        state.playing.retain(|b| b.id != id);
        state.stopped.push(id);
    }

    fn take_finished(&mut self) -> Vec<BufferId> {
        std::mem::take(&mut self.shared.lock().unwrap().finished)
    }
}

/// Wall-clock sink that plays nothing. Used when no audio output is built in,
/// so scheduling and interruption still behave normally.
pub struct SilentSink {
    started: Instant,
    playing: Vec<ScheduledBuffer>,
}

impl SilentSink {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            playing: Vec::new(),
        }
    }
}

impl Default for SilentSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for SilentSink {
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn play_at(&mut self, id: BufferId, chunk: AudioChunk, at: f64) -> anyhow::Result<()> {
        self.playing.push(ScheduledBuffer {
            id,
            start: at,
            duration: chunk.duration_secs(),
        });
        Ok(())
    }

    fn stop(&mut self, id: BufferId) {
        self.playing.retain(|b| b.id != id);
    }

    fn take_finished(&mut self) -> Vec<BufferId> {
        let now = self.now();
        let (ended, still): (Vec<_>, Vec<_>) = self
            .playing
            .drain(..)
            .partition(|b| b.start + b.duration <= now);
        self.playing = still;
        ended.into_iter().map(|b| b.id).collect()
    }
}
