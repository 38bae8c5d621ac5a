//! Rolling transcript of the coach's spoken replies.

use std::collections::VecDeque;

/// How many transcript lines the session keeps.
pub const TRANSCRIPT_CAP: usize = 5;

/// Fixed-capacity ring of transcript lines. Pushing past capacity evicts the
/// oldest line.
#[derive(Debug, Clone)]
pub struct TranscriptRing {
    lines: VecDeque<String>,
    cap: usize,
}

impl TranscriptRing {
    pub fn new() -> Self {
        Self::with_cap(TRANSCRIPT_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Oldest-first snapshot of the current lines.
    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for TranscriptRing {
    fn default() -> Self {
        Self::new()
    }
}
