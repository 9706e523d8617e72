//! Reductions over raw sample lists.
//!
//! Every function here has a defined answer for an empty input: either `None`
//! or [`StatsError::NoData`]. Nothing divides by a zero count.

use crate::util;
use std::convert::TryFrom;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("No data")]
    NoData,
    #[error("Percentile {0} is outside 0..=100")]
    OutOfRange(f64),
}

/// Arithmetic mean, or `None` when there is nothing to average.
pub fn mean(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let avg = total / samples.len() as u128;
    Some(Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX)))
}

/// Linearly interpolated percentile of an unordered list.
///
/// The rank is `percentile / 100 * (len - 1)`; values between two ranks are
/// interpolated, so the 50th percentile of `[1, 2, 3, 4]` is `2.5` and the
/// 100th is always the maximum.
pub fn percentile(values: &[f64], percentile: f64) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::NoData);
    }
    if !(0.0..=100.0).contains(&percentile) {
        return Err(StatsError::OutOfRange(percentile));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    match (sorted.get(lower), sorted.get(upper)) {
        (Some(lo), Some(hi)) => Ok(lo + (hi - lo) * (rank - lower as f64)),
        _ => Err(StatsError::NoData),
    }
}

/// [`percentile`] over durations, at microsecond resolution.
pub fn percentile_duration(samples: &[Duration], pct: f64) -> Result<Duration, StatsError> {
    let micros: Vec<f64> = samples
        .iter()
        .map(|d| d.as_nanos() as f64 / 1_000.0)
        .collect();
    percentile(&micros, pct).map(util::f64_to_dur)
}
