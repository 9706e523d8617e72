use crate::counter::Counters;
use crate::histogram::Histograms;
use crate::sample::Sample;
use crate::series::Series;
use crate::snapshots::{Percentile, Snapshot};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

#[derive(Debug)]
pub enum Interest<T> {
    Samples(T),
    LatencyPercentile(T),
    Attempts(T),
}

#[derive(Debug)]
enum Message<T> {
    Finished(Sample<T>),
    Started(T),
}

/// Single consumer of every sample sent through its handles.
///
/// Handles may live on any thread; only the collector mutates the recorded
/// data, and only when `process_outstanding` drains the channel.
pub struct Collector<T> {
    series: Series<T>,
    latency_histograms: Histograms<T>,
    attempts: Counters<T>,
    tx: Sender<Message<T>>,
    rx: Receiver<Message<T>>,
    percentiles: Vec<Percentile>,
}

pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile::new("p50", 50.0),
        Percentile::new("p90", 90.0),
        Percentile::new("p99", 99.0),
    ]
}

impl<T> Default for Collector<T>
where
    T: Hash + Eq + Send + Display + Clone,
{
    fn default() -> Self {
        Collector::new()
    }
}

impl<T> Collector<T>
where
    T: Hash + Eq + Send + Display + Clone,
{
    pub fn new() -> Collector<T> {
        Collector::with_percentiles(default_percentiles())
    }

    pub fn with_percentiles(percentiles: Vec<Percentile>) -> Collector<T> {
        let (tx, rx) = unbounded();
        Collector {
            series: Series::new(),
            latency_histograms: Histograms::new(),
            attempts: Counters::new(),
            tx,
            rx,
            percentiles,
        }
    }

    pub fn register(&mut self, ty: Interest<T>) {
        match ty {
            Interest::Samples(key) => self.series.init(key),
            Interest::LatencyPercentile(key) => self.latency_histograms.init(key),
            Interest::Attempts(key) => self.attempts.init(key),
        }
    }

    pub fn handle(&self) -> CollectorHandle<T> {
        CollectorHandle {
            sender: self.tx.clone(),
        }
    }

    /// Drain every sample sent so far. Returns how many samples were received.
    pub fn process_outstanding(&mut self) -> usize {
        let mut received = 0;
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Message::Finished(sample) => {
                    let key = sample.key();
                    let elapsed = sample.duration();
                    self.series.push(&key, elapsed);
                    self.latency_histograms.record(&key, elapsed);
                    received += 1;
                }
                Message::Started(key) => self.attempts.increment(&key),
            }
        }
        received
    }

    pub fn samples(&self, key: &T) -> &[Duration] {
        self.series.get(key)
    }

    /// Started operations for keys registered with `Interest::Attempts`.
    pub fn attempts(&self, key: &T) -> Option<u64> {
        self.attempts.get(key)
    }

    pub fn snapshot(&self, key: &T) -> Snapshot<T> {
        Snapshot::new(
            key.clone(),
            self.series.get(key),
            self.attempts.get(key),
            self.latency_histograms.get(key),
            &self.percentiles,
        )
    }
}

#[derive(Debug, Clone)]
pub struct CollectorHandle<T> {
    sender: Sender<Message<T>>,
}

impl<T: Hash + Eq + Send + Display + Clone> CollectorHandle<T> {
    pub fn send(&self, sample: Sample<T>) {
        // the receiving collector owns a sender too, so this only fails once it is gone
        let _ = self.sender.send(Message::Finished(sample));
    }

    pub fn send_elapsed(&self, key: T, d: Duration) {
        self.send(Sample::elapsed(key, d))
    }

    /// Count one start of the operation measured under `key`.
    pub fn send_started(&self, key: T) {
        let _ = self.sender.send(Message::Started(key));
    }
}
