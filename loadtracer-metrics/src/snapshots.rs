use crate::stats;
use crate::util;
use hdrhistogram::Histogram;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Percentile {
    label: String,
    percentile: f64,
}

impl Percentile {
    pub fn new<S: Into<String>>(label: S, percentile: f64) -> Percentile {
        Percentile {
            label: label.into(),
            percentile,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Spread of a latency histogram.
#[derive(Debug, Clone)]
pub struct HistoSnapshot<T> {
    min: T,
    max: T,
    stdev: T,
}

impl<T: Clone> HistoSnapshot<T> {
    pub fn min(&self) -> T {
        self.min.clone()
    }

    pub fn max(&self) -> T {
        self.max.clone()
    }

    pub fn stdev(&self) -> T {
        self.stdev.clone()
    }
}

impl HistoSnapshot<Duration> {
    /// `None` for a histogram that has not recorded anything.
    pub fn from_histo(histo: &Histogram<u64>) -> Option<HistoSnapshot<Duration>> {
        if histo.is_empty() {
            return None;
        }
        Some(HistoSnapshot {
            min: util::u64_to_dur(histo.min()),
            max: util::u64_to_dur(histo.max()),
            stdev: util::f64_to_dur(histo.stdev()),
        })
    }
}

/// Point-in-time view of everything recorded for one key.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    key: T,
    count: usize,
    attempts: Option<u64>,
    mean: Option<Duration>,
    percentiles: Vec<(Percentile, Duration)>,
    latency_snapshot: Option<HistoSnapshot<Duration>>,
}

impl<T: Eq + Hash + Display + Send + Clone> Snapshot<T> {
    pub fn new(
        key: T,
        samples: &[Duration],
        attempts: Option<u64>,
        latency_histogram: Option<&Histogram<u64>>,
        percentiles: &[Percentile],
    ) -> Snapshot<T> {
        let percentiles = percentiles
            .iter()
            .filter_map(|p| {
                stats::percentile_duration(samples, p.percentile)
                    .ok()
                    .map(|d| (p.clone(), d))
            })
            .collect();
        Snapshot {
            key,
            count: samples.len(),
            attempts,
            mean: stats::mean(samples),
            percentiles,
            latency_snapshot: latency_histogram.and_then(HistoSnapshot::from_histo),
        }
    }

    pub fn key(&self) -> T {
        self.key.clone()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// How often the measured operation was started, for keys that count attempts.
    pub fn attempts(&self) -> Option<u64> {
        self.attempts
    }

    /// Mean of the samples; undefined (`None`) when there are none.
    pub fn mean(&self) -> Option<Duration> {
        self.mean
    }

    pub fn percentiles(&self) -> &[(Percentile, Duration)] {
        &self.percentiles
    }

    pub fn latency_histogram(&self) -> Option<HistoSnapshot<Duration>> {
        self.latency_snapshot.clone()
    }
}
