use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

/// A single elapsed-time observation for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample<T> {
    key: T,
    elapsed: Duration,
}

impl<T: Hash + Eq + Send + Display + Clone> Sample<T> {
    /// Create a sample from the given key and duration
    pub fn elapsed(key: T, elapsed: Duration) -> Sample<T> {
        Sample { key, elapsed }
    }

    /// Get the key of this `Sample`
    pub fn key(&self) -> T {
        self.key.clone()
    }

    pub fn duration(&self) -> Duration {
        self.elapsed
    }
}
