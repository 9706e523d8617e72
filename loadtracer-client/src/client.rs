use crate::connectors::MaybeTlsStream;
use crate::error::ClientError;
use crate::tracer::PhaseTracer;
use futures::future;
use http::header::{HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use hyper::body::HttpBody;
use hyper::client::conn::{self, ResponseFuture, SendRequest};
use hyper::Body;
use log::debug;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT_VALUE: &str = concat!("loadtracer/", env!("CARGO_PKG_VERSION"));
const ALPN_HTTP1: &[&[u8]] = &[b"http/1.1" as &[u8]];
const ALPN_HTTP2: &[&[u8]] = &[b"h2" as &[u8]];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 100;
pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 100;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 262_144 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

#[derive(Debug, Error)]
#[error("Unknown HTTP version '{0}', expected 1 or 2")]
pub struct UnknownProtocol(pub String);

impl Protocol {
    pub fn alpn(self) -> &'static [&'static [u8]] {
        match self {
            Protocol::Http1 => ALPN_HTTP1,
            Protocol::Http2 => ALPN_HTTP2,
        }
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Protocol, UnknownProtocol> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "1.1" | "http1" | "http/1.1" => Ok(Protocol::Http1),
            "2" | "h2" | "http2" | "http/2" => Ok(Protocol::Http2),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Http1 => f.write_str("HTTP/1.1"),
            Protocol::Http2 => f.write_str("HTTP/2"),
        }
    }
}

/// Transport settings fixed when an issuer is built.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Absolute limit for one request, from acquiring a connection to the last body byte.
    pub timeout: Duration,
    pub max_idle_per_host: usize,
    /// Open HTTP/1.1 connections allowed at once, zero for no limit.
    pub max_conns_per_host: usize,
    pub idle_timeout: Duration,
    pub nodelay: bool,
    pub max_frame_size: u32,
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            timeout: DEFAULT_TIMEOUT,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
            max_conns_per_host: DEFAULT_MAX_CONNS_PER_HOST,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// A validated `http`/`https` URL that every request of a run is sent to.
#[derive(Debug, Clone)]
pub struct Target {
    uri: Uri,
    host: String,
    port: u16,
    https: bool,
}

impl Target {
    pub fn parse(url: &str) -> Result<Target, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let uri = url
            .parse::<Uri>()
            .map_err(|e| invalid(&e.to_string()))?;
        let https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            Some(_) => return Err(invalid("scheme must be http or https")),
            None => return Err(invalid("missing scheme")),
        };
        let host = match uri.host() {
            Some(h) if !h.is_empty() => h.trim_start_matches('[').trim_end_matches(']').to_string(),
            _ => return Err(invalid("missing host")),
        };
        let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });
        Ok(Target {
            uri,
            host,
            port,
            https,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_https(&self) -> bool {
        self.https
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    fn authority(&self) -> &str {
        self.uri
            .authority()
            .map(|a| a.as_str())
            .unwrap_or_else(|| self.host.as_str())
    }

    fn origin_form(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/")
    }

    /// GET in origin form with a `Host` header, as HTTP/1.1 sends it.
    pub(crate) fn origin_request(&self) -> Result<Request<Body>, ClientError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.origin_form())
            .header(HOST, self.authority())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Body::empty())?;
        Ok(req)
    }

    /// GET with the absolute URI, from which HTTP/2 takes scheme and authority.
    pub(crate) fn absolute_request(&self) -> Result<Request<Body>, ClientError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.uri.clone())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Body::empty())?;
        Ok(req)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Status and body size of a response that was read to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exchanged {
    pub status: StatusCode,
    pub body_bytes: u64,
}

/// Run the protocol handshake on a dialed stream and drive the connection in the background.
pub(crate) async fn handshake(
    builder: &conn::Builder,
    io: MaybeTlsStream,
) -> Result<SendRequest<Body>, ClientError> {
    let (sender, connection) = builder.handshake(io).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("connection closed: {}", e);
        }
    });
    Ok(sender)
}

/// Wait until the connection can take another request.
pub(crate) async fn ready(sender: &mut SendRequest<Body>) -> Result<(), hyper::Error> {
    future::poll_fn(|cx| sender.poll_ready(cx)).await
}

/// Await the response head, then count the body to its end.
pub(crate) async fn read_response(
    response: ResponseFuture,
    tracer: &mut PhaseTracer,
) -> Result<Exchanged, ClientError> {
    let res = response.await?;
    tracer.first_byte();
    let status = res.status();
    let mut body = res.into_body();
    let mut read: u64 = 0;
    while let Some(chunk) = body.data().await {
        match chunk {
            Ok(bytes) => read += bytes.len() as u64,
            Err(source) => return Err(ClientError::Body { read, source }),
        }
    }
    Ok(Exchanged {
        status,
        body_bytes: read,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_targets() {
        let t = Target::parse("https://example.com/test-1mb").unwrap();
        assert_eq!(t.host(), "example.com");
        assert_eq!(t.port(), 443);
        assert!(t.is_https());
        assert_eq!(t.origin_form(), "/test-1mb");

        let t = Target::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(t.port(), 8080);
        assert!(!t.is_https());
        assert_eq!(t.origin_form(), "/");
        assert_eq!(t.authority(), "127.0.0.1:8080");

        let t = Target::parse("http://[::1]:9000/x").unwrap();
        assert_eq!(t.host(), "::1");
    }

    #[test]
    fn rejects_malformed_targets() {
        for url in &["ftp://example.com/", "/just/a/path", "not a url", "example.com"] {
            match Target::parse(url) {
                Err(ClientError::InvalidUrl { .. }) => {}
                other => panic!("{} parsed as {:?}", url, other),
            }
        }
    }

    #[test]
    fn origin_request_carries_host() {
        let t = Target::parse("http://example.com:81/a?b=c").unwrap();
        let req = t.origin_request().unwrap();
        assert_eq!(req.uri(), "/a?b=c");
        assert_eq!(req.headers()[HOST], "example.com:81");
        let req = t.absolute_request().unwrap();
        assert_eq!(req.uri(), "http://example.com:81/a?b=c");
    }

    #[test]
    fn protocol_names() {
        assert_eq!("1".parse::<Protocol>().unwrap(), Protocol::Http1);
        assert_eq!("h2".parse::<Protocol>().unwrap(), Protocol::Http2);
        assert!("3".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Http2.alpn(), &[b"h2" as &[u8]]);
    }
}
