use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid target url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("DNS resolution of {host} failed: {source}")]
    Dns { host: String, source: io::Error },
    #[error("Did not resolve an address for {0}")]
    NoAddress(String),
    #[error("Connection to {addr} failed: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("Invalid TLS server name: {0}")]
    ServerName(String),
    #[error("TLS handshake failed: {0}")]
    Tls(io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
    #[error("Could not build request: {0}")]
    Request(#[from] http::Error),
    #[error("Response body failed after {read} bytes: {source}")]
    Body { read: u64, source: hyper::Error },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection pool closed")]
    PoolClosed,
    #[error("Transport returned neither a response nor an error")]
    MissingResponse,
}

impl ClientError {
    /// Bytes of response body that arrived before the failure.
    pub fn bytes_read(&self) -> u64 {
        match self {
            ClientError::Body { read, .. } => *read,
            _ => 0,
        }
    }
}
