use std::time::Duration;

pub fn dur_to_u64(d: Duration) -> u64 {
    d.as_secs()
        .saturating_mul(1_000_000)
        .saturating_add(d.subsec_micros().into())
}

pub fn u64_to_dur(v: u64) -> Duration {
    Duration::from_micros(v)
}

pub fn f64_to_dur(v: f64) -> Duration {
    if v.is_finite() && v > 0.0 {
        u64_to_dur(v.round() as u64)
    } else {
        Duration::from_micros(0)
    }
}
