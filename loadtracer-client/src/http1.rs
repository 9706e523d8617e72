use crate::client::{self, ClientOptions, Exchanged, Protocol, Target};
use crate::connectors::{tls_config, TracingHttpsConnector};
use crate::error::ClientError;
use crate::issuer::{self, IssueFuture, RequestIssuer};
use crate::tracer::{ConnInfo, PhaseTracer};
use hyper::client::conn::{self, SendRequest};
use hyper::Body;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// An open connection. The permit counts it against the per-host limit until dropped.
struct Conn {
    sender: SendRequest<Body>,
    _permit: OwnedSemaphorePermit,
}

struct Idle {
    conn: Conn,
    since: Instant,
}

/// HTTP/1.1 issuer with a pool of idle keep-alive connections.
///
/// A connection serves one request at a time. It goes back to the pool once
/// its response body has been read to the end, unless the pool is full.
/// Once `max_conns_per_host` connections are open, further requests wait for
/// one of them to come back instead of dialing.
#[derive(Clone)]
pub struct Http1Issuer {
    inner: Arc<Inner>,
}

struct Inner {
    target: Target,
    connector: TracingHttpsConnector,
    builder: conn::Builder,
    options: ClientOptions,
    idle: Mutex<Vec<Idle>>,
    released: Notify,
    conns: Arc<Semaphore>,
}

impl Http1Issuer {
    pub fn new(target: Target, options: ClientOptions) -> Http1Issuer {
        let connector =
            TracingHttpsConnector::new(options.nodelay, tls_config(Protocol::Http1.alpn()));
        let limit = match options.max_conns_per_host {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        Http1Issuer {
            inner: Arc::new(Inner {
                target,
                connector,
                builder: conn::Builder::new(),
                options,
                idle: Mutex::new(Vec::new()),
                released: Notify::new(),
                conns: Arc::new(Semaphore::new(limit)),
            }),
        }
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Connections currently parked in the pool.
    pub fn idle_connections(&self) -> usize {
        self.inner.idle().len()
    }
}

impl RequestIssuer for Http1Issuer {
    fn issue(&self, mut tracer: PhaseTracer) -> IssueFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let started = Instant::now();
            let timeout = inner.options.timeout;
            issuer::complete(started, timeout, inner.round_trip(&mut tracer)).await
        })
    }
}

impl Inner {
    fn idle(&self) -> MutexGuard<'_, Vec<Idle>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self, tracer: &mut PhaseTracer) -> Result<Exchanged, ClientError> {
        let req = self.target.origin_request()?;
        tracer.acquire_start();
        let mut conn = self.acquire(tracer).await?;
        let response = conn.sender.send_request(req);
        let exchanged = client::read_response(response, tracer).await?;
        self.release(conn, tracer);
        Ok(exchanged)
    }

    async fn acquire(&self, tracer: &mut PhaseTracer) -> Result<Conn, ClientError> {
        loop {
            // registered before checking the pool so a release in between is not missed
            let released = self.released.notified();
            while let Some(mut idle) = self.checkout() {
                let idle_time = idle.since.elapsed();
                match client::ready(&mut idle.conn.sender).await {
                    Ok(()) => {
                        tracer.acquired(ConnInfo::reused(Some(idle_time)));
                        return Ok(idle.conn);
                    }
                    Err(e) => debug!("discarding pooled connection: {}", e),
                }
            }

            let permit = match Arc::clone(&self.conns).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("connection limit reached, waiting for a connection");
                    tokio::select! {
                        permit = Arc::clone(&self.conns).acquire_owned() => {
                            permit.map_err(|_| ClientError::PoolClosed)?
                        }
                        _ = released => continue,
                    }
                }
            };

            let io = self.connector.connect(&self.target, tracer).await?;
            let mut sender = client::handshake(&self.builder, io).await?;
            client::ready(&mut sender).await?;
            tracer.acquired(ConnInfo::fresh());
            return Ok(Conn {
                sender,
                _permit: permit,
            });
        }
    }

    /// Most recently parked connection that has not outlived the idle timeout.
    fn checkout(&self) -> Option<Idle> {
        let mut idle = self.idle();
        while let Some(entry) = idle.pop() {
            if entry.since.elapsed() <= self.options.idle_timeout {
                return Some(entry);
            }
        }
        None
    }

    fn release(&self, conn: Conn, tracer: &mut PhaseTracer) {
        let pooled = {
            let mut idle = self.idle();
            if idle.len() < self.options.max_idle_per_host {
                idle.push(Idle {
                    conn,
                    since: Instant::now(),
                });
                true
            } else {
                false
            }
        };
        tracer.put_idle(pooled);
        self.released.notify_waiters();
    }
}
