mod collector;
mod counter;
mod histogram;
mod sample;
mod series;
mod snapshots;
pub mod stats;
mod stopwatch;
mod util;

pub use self::collector::{default_percentiles, Collector, CollectorHandle, Interest};
pub use self::stopwatch::Stopwatch;
pub mod metrics {
    pub use crate::counter::Counters;
    pub use crate::histogram::Histograms;
    pub use crate::series::Series;
}
pub mod data {
    pub use crate::sample::Sample;
    pub use crate::snapshots::{HistoSnapshot, Percentile, Snapshot};
}
