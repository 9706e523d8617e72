use crate::dispatch::RunTotals;
use crate::tracer::Phase;
use loadtracer_metrics::data::Snapshot;
use loadtracer_metrics::Collector;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Summary of a finished run.
///
/// Rates are `None` when they would divide by zero: no requests issued, or
/// no measurable elapsed time.
#[derive(Debug, Clone)]
pub struct Report {
    pub phases: Vec<Snapshot<Phase>>,
    pub elapsed: Duration,
    pub requests_issued: u64,
    pub requests_failed: u64,
    pub transport_failures: u64,
    pub status_failures: u64,
    pub bytes_received: u64,
    /// Fraction of issued requests that succeeded, in `0.0..=1.0`.
    pub success_rate: Option<f64>,
    /// Successful requests per second.
    pub throughput: Option<f64>,
    /// Successful body bytes per second, in MB.
    pub bandwidth: Option<f64>,
}

pub fn summarize(totals: &RunTotals, phases: &Collector<Phase>, elapsed: Duration) -> Report {
    let successes = totals.successes() as f64;
    let secs = elapsed.as_secs_f64();
    let per_second = |v: f64| if secs > 0.0 { Some(v / secs) } else { None };
    let success_rate = if totals.requests_issued() > 0 {
        Some(successes / totals.requests_issued() as f64)
    } else {
        None
    };

    Report {
        phases: Phase::ALL.iter().map(|p| phases.snapshot(p)).collect(),
        elapsed,
        requests_issued: totals.requests_issued(),
        requests_failed: totals.requests_failed(),
        transport_failures: totals.transport_failures(),
        status_failures: totals.status_failures(),
        bytes_received: totals.bytes_received(),
        success_rate,
        throughput: per_second(successes),
        bandwidth: per_second(totals.bytes_received() as f64 / BYTES_PER_MB),
    }
}

impl Report {
    pub fn phase(&self, phase: Phase) -> Option<&Snapshot<Phase>> {
        self.phases.iter().find(|s| s.key() == phase)
    }
}

fn fmt_duration(d: &Duration) -> String {
    if d.as_secs() >= 5 {
        format!("{:.3}s", d.as_secs_f64())
    } else if d.as_millis() >= 1 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn fmt_size(s: u64) -> String {
    let magnitudes = &["B", "KB", "MB", "GB"];
    let max_magnitude = magnitudes.len() - 1;
    let mut total = s as f64;
    let mut cur_magnitude = 0;
    while total > 1024.0 && cur_magnitude < max_magnitude {
        total /= 1024.0;
        cur_magnitude += 1;
    }
    if cur_magnitude == 0 {
        format!("{:.0}{}", total, magnitudes[cur_magnitude])
    } else {
        format!("{:.1}{}", total, magnitudes[cur_magnitude])
    }
}

fn fmt_rate(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{:.2} {}", v, unit),
        None => "n/a".into(),
    }
}

fn format_snapshot(s: &Snapshot<Phase>, f: &mut Formatter) -> FmtResult {
    let mean = s
        .mean()
        .map(|m| fmt_duration(&m))
        .unwrap_or_else(|| "n/a".into());
    write!(f, "  {:<8} count {:<6}", s.key(), s.count())?;
    if let Some(attempts) = s.attempts() {
        write!(f, " of {:<6} started", attempts)?;
    }
    write!(f, " avg {:<10}", mean)?;
    if let Some(h) = s.latency_histogram() {
        write!(
            f,
            " min {} / max {} / stdev {}",
            fmt_duration(&h.min()),
            fmt_duration(&h.max()),
            fmt_duration(&h.stdev())
        )?;
    }
    for (p, v) in s.percentiles() {
        write!(f, " {} {}", p, fmt_duration(v))?;
    }
    writeln!(f)
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        writeln!(f, "Phases:")?;
        for s in &self.phases {
            format_snapshot(s, f)?;
        }
        writeln!(f, "Elapsed: {}", fmt_duration(&self.elapsed))?;
        writeln!(
            f,
            "Requests: {} issued, {} failed ({} transport, {} status)",
            self.requests_issued, self.requests_failed, self.transport_failures, self.status_failures
        )?;
        writeln!(
            f,
            "Success rate: {}",
            self.success_rate
                .map(|r| format!("{:.2}%", r * 100.0))
                .unwrap_or_else(|| "n/a".into())
        )?;
        writeln!(f, "Requests/s: {}", fmt_rate(self.throughput, "req/s"))?;
        writeln!(f, "Bandwidth: {}", fmt_rate(self.bandwidth, "MB/s"))?;
        write!(f, "Received: {}", fmt_size(self.bytes_received))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tracer;

    fn collector() -> Collector<Phase> {
        let mut c = Collector::new();
        tracer::configure_collector(&mut c);
        c
    }

    fn totals(issued: u64, failed: u64, bytes: u64) -> RunTotals {
        RunTotals {
            requests_issued: issued,
            requests_failed: failed,
            transport_failures: failed,
            status_failures: 0,
            bytes_received: bytes,
        }
    }

    #[test]
    fn derives_rates() {
        let mut c = collector();
        let handle = c.handle();
        handle.send_elapsed(Phase::TimeToFirstByte, Duration::from_millis(10));
        handle.send_elapsed(Phase::TimeToFirstByte, Duration::from_millis(30));
        c.process_outstanding();

        let report = summarize(&totals(10, 2, 4 * 1_048_576), &c, Duration::from_secs(2));
        assert_eq!(report.success_rate, Some(0.8));
        assert_eq!(report.throughput, Some(4.0));
        assert_eq!(report.bandwidth, Some(2.0));
        let ttfb = report.phase(Phase::TimeToFirstByte).unwrap();
        assert_eq!(ttfb.count(), 2);
        assert_eq!(ttfb.attempts(), None);
        assert_eq!(ttfb.mean(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn empty_phases_have_undefined_means() {
        let report = summarize(&totals(0, 0, 0), &collector(), Duration::from_secs(0));
        assert_eq!(report.success_rate, None);
        assert_eq!(report.throughput, None);
        assert_eq!(report.bandwidth, None);
        for s in &report.phases {
            assert_eq!(s.count(), 0);
            assert_eq!(s.mean(), None);
        }
        let text = report.to_string();
        assert!(text.contains("DNS"));
        assert!(text.contains("n/a"));
    }

    #[test]
    fn started_handshakes_are_shown_beside_samples() {
        let mut c = collector();
        let handle = c.handle();
        for _ in 0..3 {
            handle.send_started(Phase::TlsHandshake);
        }
        handle.send_elapsed(Phase::TlsHandshake, Duration::from_millis(4));
        c.process_outstanding();
        let report = summarize(&totals(3, 2, 0), &c, Duration::from_secs(1));
        let tls = report.phase(Phase::TlsHandshake).unwrap();
        assert_eq!((tls.count(), tls.attempts()), (1, Some(3)));
        let line = report
            .to_string()
            .lines()
            .find(|l| l.trim_start().starts_with("TLS"))
            .map(str::to_string)
            .unwrap();
        assert!(line.contains("count 1"), "{}", line);
        assert!(line.contains("of 3"), "{}", line);
    }

    #[test]
    fn formats_durations_and_sizes() {
        assert_eq!(fmt_duration(&Duration::from_micros(250)), "250µs");
        assert_eq!(fmt_duration(&Duration::from_micros(1500)), "1.50ms");
        assert_eq!(fmt_duration(&Duration::from_millis(6500)), "6.500s");
        assert_eq!(fmt_size(512), "512B");
        assert_eq!(fmt_size(3 * 1_048_576 / 2), "1.5MB");
    }
}
