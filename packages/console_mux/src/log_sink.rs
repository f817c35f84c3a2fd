//! Bounded append-only buffer feeding the terminal renderer.
//!
//! Entries are opaque text chunks in arrival order. Once the buffer holds
//! `capacity` entries each append evicts the oldest one.

use std::collections::VecDeque;

/// Number of entries kept when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

pub struct LogSink {
    entries: VecDeque<String>,
    capacity: usize,
    revision: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            revision: 0,
        }
    }

    pub fn append(&mut self, entry: String) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.revision += 1;
    }

    /// Oldest to newest. Each call starts a fresh pass over the buffer.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    /// All retained entries concatenated, as the terminal renderer consumes them.
    pub fn contents(&self) -> String {
        self.entries.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bumped on every mutation; renderers compare it to skip redundant redraws.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Only a fresh session clears the log.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.revision += 1;
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}
