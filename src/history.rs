use std::collections::VecDeque;
use std::io::{self, Write};

/// Number of lines kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded, insertion-ordered record of recent input lines.
///
/// Once full, every new entry evicts the oldest one. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl History {
    /// Create an empty history. A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.into());
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

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Write the entries, oldest first, numbered from 1.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for (i, line) in self.iter().enumerate() {
            writeln!(out, "{:>4}  {}", i + 1, line)?;
        }
        Ok(())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
