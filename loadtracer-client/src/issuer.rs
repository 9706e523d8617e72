use crate::client::Exchanged;
use crate::error::ClientError;
use crate::tracer::PhaseTracer;
use http::StatusCode;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

pub type IssueFuture = Pin<Box<dyn Future<Output = RequestResult> + Send>>;

/// Something that can send one request to a fixed target.
///
/// Each call gets its own tracer and owns it until the returned future
/// completes; dropping the tracer is what publishes its samples.
pub trait RequestIssuer: Send + Sync + 'static {
    fn issue(&self, tracer: PhaseTracer) -> IssueFuture;
}

/// Outcome of one issued request.
#[derive(Debug)]
pub struct RequestResult {
    pub status: Option<StatusCode>,
    pub duration: Duration,
    pub body_bytes: u64,
    pub error: Option<ClientError>,
}

impl RequestResult {
    pub fn completed(status: StatusCode, duration: Duration, body_bytes: u64) -> RequestResult {
        RequestResult {
            status: Some(status),
            duration,
            body_bytes,
            error: None,
        }
    }

    pub fn failed(error: ClientError, duration: Duration) -> RequestResult {
        RequestResult {
            status: None,
            duration,
            body_bytes: error.bytes_read(),
            error: Some(error),
        }
    }

    /// A result with neither a status nor an error becomes a transport failure.
    pub fn normalize(mut self) -> RequestResult {
        if self.status.is_none() && self.error.is_none() {
            self.error = Some(ClientError::MissingResponse);
        }
        self
    }

    /// No transport error and a 2xx status.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.map_or(false, |s| s.is_success())
    }
}

/// Drive one exchange under the request timeout and turn it into a result.
pub(crate) async fn complete<F>(started: Instant, timeout: Duration, exchange: F) -> RequestResult
where
    F: Future<Output = Result<Exchanged, ClientError>>,
{
    let outcome = match tokio::time::timeout(timeout, exchange).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ClientError::Timeout(timeout)),
    };
    let duration = started.elapsed();
    match outcome {
        Ok(ex) => RequestResult::completed(ex.status, duration, ex.body_bytes),
        Err(e) => RequestResult::failed(e, duration),
    }
}
