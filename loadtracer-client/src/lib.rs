mod client;
mod connectors;
mod dispatch;
mod dns;
mod error;
mod http1;
mod http2;
mod issuer;
mod report;
mod tracer;

pub use crate::client::{
    ClientOptions, Protocol, Target, UnknownProtocol, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MAX_CONNS_PER_HOST, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_IDLE_PER_HOST, DEFAULT_TIMEOUT,
};
pub use crate::connectors::{tls_config, MaybeTlsStream, TracingConnector, TracingHttpsConnector};
pub use crate::dispatch::{Dispatcher, RunOutcome, RunTotals};
pub use crate::dns::resolve;
pub use crate::error::ClientError;
pub use crate::http1::Http1Issuer;
pub use crate::http2::Http2Issuer;
pub use crate::issuer::{IssueFuture, RequestIssuer, RequestResult};
pub use crate::report::{summarize, Report};
pub use crate::tracer::{configure_collector, ConnInfo, Phase, PhaseTracer};
