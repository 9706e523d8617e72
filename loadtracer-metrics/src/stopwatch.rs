use crate::sample::Sample;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Stopwatch::new()
    }
}

impl Stopwatch {
    /// Create a new Stopwatch, and start it.
    pub fn new() -> Stopwatch {
        Stopwatch {
            start: Instant::now(),
        }
    }

    /// Time since the stopwatch was started
    pub fn lap(&self) -> Duration {
        self.start.elapsed()
    }

    /// Create a Sample for the given key from the elapsed duration
    pub fn elapsed<T: Eq + Hash + Send + Display + Clone>(&self, key: T) -> Sample<T> {
        Sample::elapsed(key, self.lap())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn elapsed_sample_carries_key_and_monotonic_duration() {
        let sw = Stopwatch::new();
        let first = sw.lap();
        let sample = sw.elapsed("dns");
        assert_eq!(sample.key(), "dns");
        assert!(sample.duration() >= first);
    }
}
