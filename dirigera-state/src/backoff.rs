//! Reconnect backoff ladder

use std::time::Duration;

use crate::config::DEFAULT_BACKOFF_SECS;

/// Stateful delay sequence for reconnect attempts
///
/// Walks a fixed ladder of delays one step per failure and repeats the last
/// step once the end is reached. A successful connection resets it to the
/// first step.
#[derive(Debug, Clone)]
pub struct Backoff {
    ladder: Vec<Duration>,
    index: usize,
}

impl Backoff {
    /// Create a backoff over `ladder`
    ///
    /// An empty ladder falls back to the default 1..20 second ladder.
    pub fn new(ladder: Vec<Duration>) -> Self {
        let ladder = if ladder.is_empty() {
            default_ladder()
        } else {
            ladder
        };
        Self { ladder, index: 0 }
    }

    /// Return to the first step
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Delay for the current step; advances to the next step
    pub fn next_delay(&mut self) -> Duration {
        let last = self.ladder.len() - 1;
        let delay = self.ladder[self.index.min(last)];
        self.index = (self.index + 1).min(last);
        delay
    }

    /// Current position in the ladder
    pub fn step(&self) -> usize {
        self.index
    }

    pub fn ladder(&self) -> &[Duration] {
        &self.ladder
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(default_ladder())
    }
}

fn default_ladder() -> Vec<Duration> {
    DEFAULT_BACKOFF_SECS
        .iter()
        .map(|secs| Duration::from_secs(*secs))
        .collect()
}
