//! Subtitle cursor - tracks the active chunk against the playback clock
//!
//! `seek` runs on every clock tick, so it stays synchronous and allocation
//! free. The scan is linear because parsed chunks are only best-effort
//! ordered; a binary search would silently misbehave on unsorted input.

use crate::types::TimedChunk;

/// Active-chunk tracker over a parsed chunk sequence
#[derive(Debug, Clone, Default)]
pub struct SubtitleCursor {
    chunks: Vec<TimedChunk>,
    /// Position before the first chunk that starts after the last seek time
    active_index: Option<usize>,
    last_seek_ms: Option<u64>,
}

impl SubtitleCursor {
    /// Create a cursor over a chunk sequence
    pub fn new(chunks: Vec<TimedChunk>) -> Self {
        Self {
            chunks,
            active_index: None,
            last_seek_ms: None,
        }
    }

    /// Replace the chunk sequence and forget the previous position
    pub fn reset(&mut self, chunks: Vec<TimedChunk>) {
        self.chunks = chunks;
        self.active_index = None;
        self.last_seek_ms = None;
    }

    /// Drop all chunks
    pub fn clear(&mut self) {
        self.reset(Vec::new());
    }

    /// Re-evaluate the active chunk for a playback time.
    ///
    /// Returns true when the displayed text changed.
    pub fn seek(&mut self, time_ms: u64) -> bool {
        let before = self.displayed_index();

        let candidate = self
            .chunks
            .iter()
            .position(|c| c.start_ms > time_ms)
            .unwrap_or(self.chunks.len());
        self.active_index = candidate.checked_sub(1);
        self.last_seek_ms = Some(time_ms);

        before != self.displayed_index()
    }

    fn displayed_index(&self) -> Option<usize> {
        let time = self.last_seek_ms?;
        self.active_index
            .filter(|&i| self.chunks.get(i).is_some_and(|c| c.is_active_at(time)))
    }

    /// The chunk to render, if the last seek time falls inside one
    pub fn active_chunk(&self) -> Option<&TimedChunk> {
        self.displayed_index().and_then(|i| self.chunks.get(i))
    }

    /// Text to render, if any
    pub fn active_text(&self) -> Option<&str> {
        self.active_chunk().map(|c| c.text.as_str())
    }

    /// Raw cursor position, independent of whether that chunk is on screen
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn last_seek_ms(&self) -> Option<u64> {
        self.last_seek_ms
    }

    pub fn chunks(&self) -> &[TimedChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
