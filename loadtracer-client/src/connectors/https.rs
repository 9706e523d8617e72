use super::http::TracingConnector;
use crate::client::Target;
use crate::error::ClientError;
use crate::tracer::PhaseTracer;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use std::convert::TryFrom;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// rustls client configuration trusting the webpki roots and advertising `alpn`.
pub fn tls_config(alpn: &[&[u8]]) -> ClientConfig {
    let mut root_store = RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    config
}

#[derive(Clone)]
pub struct TracingHttpsConnector {
    http: TracingConnector,
    tls_config: Arc<ClientConfig>,
}

impl TracingHttpsConnector {
    pub fn new(nodelay: bool, tls_config: ClientConfig) -> TracingHttpsConnector {
        let mut http = TracingConnector::new();
        http.set_nodelay(nodelay);
        TracingHttpsConnector {
            http,
            tls_config: Arc::new(tls_config),
        }
    }

    /// Dial the target, negotiating TLS when its scheme is `https`.
    pub async fn connect(
        &self,
        target: &Target,
        tracer: &mut PhaseTracer,
    ) -> Result<MaybeTlsStream, ClientError> {
        let tcp = self.http.connect(target.host(), target.port(), tracer).await?;
        if !target.is_https() {
            return Ok(MaybeTlsStream::Plain(tcp));
        }

        let dnsname = ServerName::try_from(target.host())
            .map_err(|e| ClientError::ServerName(format!("{}: {}", target.host(), e)))?;
        let connector = TlsConnector::from(Arc::clone(&self.tls_config));
        tracer.tls_start();
        match connector.connect(dnsname, tcp).await {
            Ok(tls) => {
                tracer.tls_done(Ok(()));
                Ok(MaybeTlsStream::Tls(Box::new(tls)))
            }
            Err(e) => {
                tracer.tls_done(Err(&e));
                Err(ClientError::Tls(e))
            }
        }
    }
}

pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
