//! Recent scan results.

use std::collections::VecDeque;

/// Distinct decoded codes, newest first, bounded.
#[derive(Debug, Clone)]
pub struct ResultLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ResultLog {
    /// Creates a log keeping at most `capacity` codes.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a code. Returns false if it was already logged.
    pub fn record(&mut self, code: &str) -> bool {
        if self.entries.iter().any(|c| c == code) {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(code.to_string());
        true
    }

    /// Iterates codes from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of codes held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new(50)
    }
}
