use log::{debug, warn};
use loadtracer_metrics::data::Sample;
use loadtracer_metrics::{Collector, CollectorHandle, Interest, Stopwatch};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ConnectionAcquire,
    DnsResolve,
    TcpConnect,
    TlsHandshake,
    TimeToFirstByte,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::ConnectionAcquire,
        Phase::DnsResolve,
        Phase::TcpConnect,
        Phase::TlsHandshake,
        Phase::TimeToFirstByte,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Phase::ConnectionAcquire => "Acquire",
            Phase::DnsResolve => "DNS",
            Phase::TcpConnect => "Connect",
            Phase::TlsHandshake => "TLS",
            Phase::TimeToFirstByte => "TTFB",
        }
    }

    /// Phases only sampled when the request had to establish a new connection.
    fn is_connection_setup(self) -> bool {
        match self {
            Phase::ConnectionAcquire | Phase::TcpConnect | Phase::TlsHandshake => true,
            Phase::DnsResolve | Phase::TimeToFirstByte => false,
        }
    }

    /// Phases with a start hook fired by the dialer, whose attempts are counted.
    fn is_dial(self) -> bool {
        match self {
            Phase::DnsResolve | Phase::TcpConnect | Phase::TlsHandshake => true,
            Phase::ConnectionAcquire | Phase::TimeToFirstByte => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.label())
    }
}

pub fn configure_collector(collector: &mut Collector<Phase>) {
    for phase in Phase::ALL.iter() {
        collector.register(Interest::Samples(*phase));
        collector.register(Interest::LatencyPercentile(*phase));
        if phase.is_dial() {
            collector.register(Interest::Attempts(*phase));
        }
    }
}

/// How a request got hold of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnInfo {
    pub reused: bool,
    pub was_idle: bool,
    pub idle_time: Duration,
}

impl ConnInfo {
    pub fn fresh() -> ConnInfo {
        ConnInfo {
            reused: false,
            was_idle: false,
            idle_time: Duration::from_secs(0),
        }
    }

    pub fn reused(idle_time: Option<Duration>) -> ConnInfo {
        ConnInfo {
            reused: true,
            was_idle: idle_time.is_some(),
            idle_time: idle_time.unwrap_or_default(),
        }
    }
}

/// Lifecycle hooks for exactly one request.
///
/// Start times live in the tracer, so concurrent requests never share them.
/// Samples and dial attempts are held back until the tracer is dropped and
/// are then sent to the run's collector in one go, minus acquire, connect and
/// TLS when the request ended up on a reused connection. A phase whose hook reports an error is
/// logged and produces no sample.
pub struct PhaseTracer {
    handle: CollectorHandle<Phase>,
    request: Stopwatch,
    acquire: Option<Stopwatch>,
    dns: Option<Stopwatch>,
    connect: Option<Stopwatch>,
    tls: Option<Stopwatch>,
    reused: bool,
    started: Vec<Phase>,
    pending: Vec<Sample<Phase>>,
}

impl PhaseTracer {
    pub fn new(handle: CollectorHandle<Phase>) -> PhaseTracer {
        PhaseTracer {
            handle,
            request: Stopwatch::new(),
            acquire: None,
            dns: None,
            connect: None,
            tls: None,
            reused: false,
            started: Vec::new(),
            pending: Vec::with_capacity(Phase::ALL.len()),
        }
    }

    /// Time since the request was issued.
    pub fn elapsed(&self) -> Duration {
        self.request.lap()
    }

    pub fn acquire_start(&mut self) {
        self.acquire = Some(Stopwatch::new());
    }

    pub fn acquired(&mut self, info: ConnInfo) {
        if info.reused {
            debug!(
                "connection reused (idle: {}, for {:?})",
                info.was_idle, info.idle_time
            );
            self.reused = true;
        }
        let started = self.acquire.take();
        self.finish(Phase::ConnectionAcquire, started);
    }

    pub fn dns_start(&mut self, host: &str) {
        debug!("resolving {}", host);
        self.started.push(Phase::DnsResolve);
        self.dns = Some(Stopwatch::new());
    }

    pub fn dns_done(&mut self, result: Result<usize, &io::Error>) {
        let started = self.dns.take();
        match result {
            Ok(addrs) => {
                debug!("resolved {} addresses", addrs);
                self.finish(Phase::DnsResolve, started);
            }
            Err(e) => warn!("error at dns resolution: {}", e),
        }
    }

    pub fn connect_start(&mut self, addr: SocketAddr) {
        debug!("connecting to {}", addr);
        self.started.push(Phase::TcpConnect);
        self.connect = Some(Stopwatch::new());
    }

    pub fn connect_done(&mut self, addr: SocketAddr, result: Result<(), &io::Error>) {
        let started = self.connect.take();
        match result {
            Ok(()) => self.finish(Phase::TcpConnect, started),
            Err(e) => warn!("error at connect to {}: {}", addr, e),
        }
    }

    pub fn tls_start(&mut self) {
        self.started.push(Phase::TlsHandshake);
        self.tls = Some(Stopwatch::new());
    }

    pub fn tls_done(&mut self, result: Result<(), &io::Error>) {
        let started = self.tls.take();
        match result {
            Ok(()) => self.finish(Phase::TlsHandshake, started),
            Err(e) => warn!("tls error: {}", e),
        }
    }

    /// Response head received; measured from the start of the request.
    pub fn first_byte(&mut self) {
        let request = self.request;
        self.finish(Phase::TimeToFirstByte, Some(request));
    }

    /// Outcome of handing the connection back to the pool.
    pub fn put_idle(&mut self, pooled: bool) {
        if pooled {
            debug!("put idle connection");
        } else {
            debug!("idle pool full, closing connection");
        }
    }

    fn finish(&mut self, phase: Phase, started: Option<Stopwatch>) {
        let started = match started {
            Some(s) => s,
            None => {
                warn!("{} finished without a matching start", phase);
                return;
            }
        };
        if self.pending.iter().any(|s| s.key() == phase) {
            debug!("{} already recorded for this request", phase);
            return;
        }
        self.pending.push(started.elapsed(phase));
    }
}

impl Drop for PhaseTracer {
    fn drop(&mut self) {
        let reused = self.reused;
        for phase in self.started.drain(..) {
            if reused && phase.is_connection_setup() {
                continue;
            }
            self.handle.send_started(phase);
        }
        for sample in self.pending.drain(..) {
            if reused && sample.key().is_connection_setup() {
                continue;
            }
            self.handle.send(sample);
        }
    }
}

impl fmt::Debug for PhaseTracer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PhaseTracer")
            .field("reused", &self.reused)
            .field("pending", &self.pending.len())
            .finish()
    }
}
