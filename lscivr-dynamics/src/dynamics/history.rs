use crate::dynamics::Derivatives;
use std::collections::VecDeque;

// derivatives kept for the multistep integrators and the restart file
pub const HISTORY_LENGTH: usize = 4;

/// Ring buffer of the most recent derivatives, newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivativeHistory {
    entries: VecDeque<Derivatives>,
}

impl DerivativeHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_LENGTH + 1),
        }
    }

    /// Builds the history from entries ordered from oldest to newest.
    /// Only the newest [HISTORY_LENGTH] entries are kept.
    pub fn from_oldest_first(entries: Vec<Derivatives>) -> Self {
        let mut history = Self::new();
        entries.into_iter().for_each(|entry| history.push(entry));
        history
    }

    pub fn push(&mut self, derivatives: Derivatives) {
        self.entries.push_front(derivatives);
        self.entries.truncate(HISTORY_LENGTH);
    }

    /// Entry `age` steps back in time, 0 is the newest one.
    pub fn get(&self, age: usize) -> Option<&Derivatives> {
        self.entries.get(age)
    }

    pub fn newest(&self) -> Option<&Derivatives> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == HISTORY_LENGTH
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn oldest_first(&self) -> Vec<Derivatives> {
        self.entries.iter().rev().cloned().collect()
    }
}
