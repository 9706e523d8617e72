use crate::client::{self, ClientOptions, Exchanged, Protocol, Target};
use crate::connectors::{tls_config, TracingHttpsConnector};
use crate::error::ClientError;
use crate::issuer::{self, IssueFuture, RequestIssuer};
use crate::tracer::{ConnInfo, PhaseTracer};
use hyper::client::conn::{self, SendRequest};
use hyper::Body;
use log::debug;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// HTTP/2 issuer multiplexing every request over one shared connection.
///
/// The first request dials while the others wait on the connection slot, so
/// a run opens a single connection unless the server closes it.
#[derive(Clone)]
pub struct Http2Issuer {
    inner: Arc<Inner>,
}

struct Inner {
    target: Target,
    connector: TracingHttpsConnector,
    builder: conn::Builder,
    options: ClientOptions,
    connection: Mutex<Option<SendRequest<Body>>>,
}

impl Http2Issuer {
    pub fn new(target: Target, options: ClientOptions) -> Http2Issuer {
        let connector =
            TracingHttpsConnector::new(options.nodelay, tls_config(Protocol::Http2.alpn()));
        let mut builder = conn::Builder::new();
        builder
            .http2_only(true)
            .http2_max_frame_size(options.max_frame_size);
        Http2Issuer {
            inner: Arc::new(Inner {
                target,
                connector,
                builder,
                options,
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }
}

impl RequestIssuer for Http2Issuer {
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
    async fn round_trip(&self, tracer: &mut PhaseTracer) -> Result<Exchanged, ClientError> {
        let req = self.target.absolute_request()?;
        tracer.acquire_start();
        let response = {
            let mut slot = self.connection.lock().await;
            let existing = match slot.take() {
                Some(mut sender) => match client::ready(&mut sender).await {
                    Ok(()) => Some(sender),
                    Err(e) => {
                        debug!("shared connection closed, dialing again: {}", e);
                        None
                    }
                },
                None => None,
            };
            let (mut sender, info) = match existing {
                Some(sender) => (sender, ConnInfo::reused(None)),
                None => (self.dial(tracer).await?, ConnInfo::fresh()),
            };
            tracer.acquired(info);
            let response = sender.send_request(req);
            *slot = Some(sender);
            response
        };
        client::read_response(response, tracer).await
    }

    async fn dial(&self, tracer: &mut PhaseTracer) -> Result<SendRequest<Body>, ClientError> {
        let io = self.connector.connect(&self.target, tracer).await?;
        let mut sender = client::handshake(&self.builder, io).await?;
        client::ready(&mut sender).await?;
        Ok(sender)
    }
}
