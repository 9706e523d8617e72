use crate::issuer::{RequestIssuer, RequestResult};
use crate::report::{self, Report};
use crate::tracer::{self, Phase, PhaseTracer};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{info, warn};
use loadtracer_metrics::Collector;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Run-level counters, only ever handed out once every request has finished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTotals {
    pub(crate) requests_issued: u64,
    pub(crate) requests_failed: u64,
    pub(crate) transport_failures: u64,
    pub(crate) status_failures: u64,
    pub(crate) bytes_received: u64,
}

impl RunTotals {
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed
    }

    pub fn successes(&self) -> u64 {
        self.requests_issued - self.requests_failed
    }

    /// Failures where no usable response arrived.
    pub fn transport_failures(&self) -> u64 {
        self.transport_failures
    }

    /// Failures where the response status was not 2xx.
    pub fn status_failures(&self) -> u64 {
        self.status_failures
    }

    /// Body bytes of successful responses.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    fn record(&mut self, result: RequestResult) {
        let result = result.normalize();
        self.requests_issued += 1;
        if result.is_success() {
            self.bytes_received += result.body_bytes;
            return;
        }
        self.requests_failed += 1;
        match (&result.error, result.status) {
            (Some(e), _) => {
                warn!("request failed after {:?}: {}", result.duration, e);
                self.transport_failures += 1;
            }
            (None, status) => {
                warn!("request returned {:?}", status);
                self.status_failures += 1;
            }
        }
    }

    fn record_aborted(&mut self, e: &JoinError) {
        warn!("request task did not complete: {}", e);
        self.requests_issued += 1;
        self.requests_failed += 1;
        self.transport_failures += 1;
    }
}

/// Everything a finished run produced.
pub struct RunOutcome {
    pub totals: RunTotals,
    pub phases: Collector<Phase>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn report(&self) -> Report {
        report::summarize(&self.totals, &self.phases, self.elapsed)
    }
}

/// Fans a request count out over one task per request and folds the results.
///
/// Results are folded by the dispatching task alone as the spawned tasks
/// finish, and phase samples reach a collector created for this run, so
/// nothing is mutated from more than one place. A failing request never
/// affects its siblings.
pub struct Dispatcher<I> {
    issuer: Arc<I>,
    concurrency: Option<NonZeroUsize>,
}

impl<I: RequestIssuer> Dispatcher<I> {
    pub fn new(issuer: I) -> Dispatcher<I> {
        Dispatcher {
            issuer: Arc::new(issuer),
            concurrency: None,
        }
    }

    /// Cap how many requests are in flight at once. `None` launches them all immediately.
    pub fn with_concurrency(mut self, limit: Option<NonZeroUsize>) -> Dispatcher<I> {
        self.concurrency = limit;
        self
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    pub async fn run(&self, count: usize) -> RunOutcome {
        let mut phases = Collector::new();
        tracer::configure_collector(&mut phases);
        let limiter = self.concurrency.map(|n| Arc::new(Semaphore::new(n.get())));
        match self.concurrency {
            Some(n) => info!("dispatching {} requests, at most {} at once", count, n),
            None => info!("dispatching {} requests", count),
        }

        let started = Instant::now();
        let inflight: FuturesUnordered<_> = (0..count)
            .map(|_| {
                let issuer = Arc::clone(&self.issuer);
                let handle = phases.handle();
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(l) => l.acquire_owned().await.ok(),
                        None => None,
                    };
                    issuer.issue(PhaseTracer::new(handle)).await
                })
            })
            .collect();

        let totals = inflight
            .fold(RunTotals::default(), |mut totals, joined| async move {
                match joined {
                    Ok(result) => totals.record(result),
                    Err(e) => totals.record_aborted(&e),
                }
                totals
            })
            .await;
        let elapsed = started.elapsed();

        phases.process_outstanding();
        RunOutcome {
            totals,
            phases,
            elapsed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ClientError;
    use crate::issuer::IssueFuture;
    use crate::tracer::ConnInfo;
    use http::StatusCode;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Walks a tracer through a scripted request without touching the network.
    struct ScriptedIssuer {
        status: Option<StatusCode>,
        body: u64,
        calls: AtomicUsize,
        inflight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        pause: Duration,
    }

    impl ScriptedIssuer {
        fn new(status: Option<StatusCode>) -> ScriptedIssuer {
            ScriptedIssuer {
                status,
                body: 1024,
                calls: AtomicUsize::new(0),
                inflight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                pause: Duration::from_millis(0),
            }
        }
    }

    impl RequestIssuer for ScriptedIssuer {
        fn issue(&self, mut tracer: PhaseTracer) -> IssueFuture {
            let reused = self.calls.fetch_add(1, Ordering::SeqCst) > 0;
            let status = self.status;
            let body = self.body;
            let pause = self.pause;
            let inflight = Arc::clone(&self.inflight);
            let peak = Arc::clone(&self.peak);
            Box::pin(async move {
                let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let addr = SocketAddr::from(([127, 0, 0, 1], 8443));
                tracer.acquire_start();
                if !reused {
                    tracer.dns_start("example.test");
                    tracer.dns_done(Ok(1));
                    tracer.connect_start(addr);
                    tracer.connect_done(addr, Ok(()));
                    tracer.tls_start();
                    tracer.tls_done(Ok(()));
                }
                tracer.acquired(if reused {
                    ConnInfo::reused(None)
                } else {
                    ConnInfo::fresh()
                });
                tokio::time::sleep(pause).await;
                tracer.first_byte();
                inflight.fetch_sub(1, Ordering::SeqCst);
                RequestResult {
                    status,
                    duration: tracer.elapsed(),
                    body_bytes: body,
                    error: None,
                }
            })
        }
    }

    struct PanickingIssuer;

    impl RequestIssuer for PanickingIssuer {
        fn issue(&self, _tracer: PhaseTracer) -> IssueFuture {
            Box::pin(futures::future::lazy(|_| -> RequestResult {
                panic!("issuer blew up")
            }))
        }
    }

    struct RefusedIssuer;

    impl RequestIssuer for RefusedIssuer {
        fn issue(&self, _tracer: PhaseTracer) -> IssueFuture {
            Box::pin(async {
                RequestResult::failed(
                    ClientError::NoAddress("example.test".to_string()),
                    Duration::from_millis(1),
                )
            })
        }
    }

    fn samples(outcome: &RunOutcome, phase: Phase) -> usize {
        outcome.phases.samples(&phase).len()
    }

    #[tokio::test]
    async fn zero_requests() {
        let outcome = Dispatcher::new(ScriptedIssuer::new(Some(StatusCode::OK)))
            .run(0)
            .await;
        assert_eq!(outcome.totals, RunTotals::default());
        for phase in Phase::ALL.iter() {
            assert_eq!(samples(&outcome, *phase), 0);
        }
    }

    #[tokio::test]
    async fn ten_successful_requests() {
        let outcome = Dispatcher::new(ScriptedIssuer::new(Some(StatusCode::OK)))
            .run(10)
            .await;
        let totals = &outcome.totals;
        assert_eq!(totals.requests_issued(), 10);
        assert_eq!(totals.requests_failed(), 0);
        assert_eq!(totals.successes(), 10);
        assert_eq!(totals.bytes_received(), 10 * 1024);
        assert!(outcome.elapsed > Duration::from_secs(0));

        let report = outcome.report();
        assert_eq!(
            report.throughput,
            Some(10.0 / outcome.elapsed.as_secs_f64())
        );
    }

    #[tokio::test]
    async fn reused_connections_only_sample_setup_once() {
        let outcome = Dispatcher::new(ScriptedIssuer::new(Some(StatusCode::OK)))
            .run(8)
            .await;
        assert_eq!(samples(&outcome, Phase::DnsResolve), 1);
        assert_eq!(samples(&outcome, Phase::TcpConnect), 1);
        assert_eq!(samples(&outcome, Phase::TlsHandshake), 1);
        assert_eq!(samples(&outcome, Phase::ConnectionAcquire), 1);
        assert_eq!(samples(&outcome, Phase::TimeToFirstByte), 8);
        assert_eq!(outcome.phases.attempts(&Phase::TlsHandshake), Some(1));
    }

    #[tokio::test]
    async fn non_success_status_counts_as_failure() {
        let outcome = Dispatcher::new(ScriptedIssuer::new(Some(StatusCode::SERVICE_UNAVAILABLE)))
            .run(5)
            .await;
        let totals = &outcome.totals;
        assert_eq!(totals.requests_failed(), 5);
        assert_eq!(totals.status_failures(), 5);
        assert_eq!(totals.transport_failures(), 0);
        assert_eq!(totals.bytes_received(), 0);
        assert_eq!(samples(&outcome, Phase::TimeToFirstByte), 5);
    }

    #[tokio::test]
    async fn missing_response_is_one_failure() {
        let outcome = Dispatcher::new(ScriptedIssuer::new(None)).run(1).await;
        assert_eq!(outcome.totals.requests_issued(), 1);
        assert_eq!(outcome.totals.requests_failed(), 1);
        assert_eq!(outcome.totals.transport_failures(), 1);
    }

    #[tokio::test]
    async fn transport_errors_do_not_stop_siblings() {
        let outcome = Dispatcher::new(RefusedIssuer).run(4).await;
        assert_eq!(outcome.totals.requests_issued(), 4);
        assert_eq!(outcome.totals.transport_failures(), 4);
        assert_eq!(outcome.totals.successes(), 0);
    }

    #[tokio::test]
    async fn panicking_request_is_a_failure() {
        let outcome = Dispatcher::new(PanickingIssuer).run(3).await;
        assert_eq!(outcome.totals.requests_issued(), 3);
        assert_eq!(outcome.totals.requests_failed(), 3);
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let mut issuer = ScriptedIssuer::new(Some(StatusCode::OK));
        issuer.pause = Duration::from_millis(5);
        let peak = Arc::clone(&issuer.peak);
        let outcome = Dispatcher::new(issuer)
            .with_concurrency(NonZeroUsize::new(3))
            .run(20)
            .await;
        assert_eq!(outcome.totals.successes(), 20);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak {}", peak);
    }
}
