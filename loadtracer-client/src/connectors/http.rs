use crate::dns;
use crate::error::ClientError;
use crate::tracer::PhaseTracer;
use tokio::net::TcpStream;

/// Plain TCP dialer that reports DNS and connect phases.
#[derive(Debug, Clone)]
pub struct TracingConnector {
    nodelay: bool,
}

impl TracingConnector {
    pub fn new() -> TracingConnector {
        TracingConnector { nodelay: false }
    }

    pub fn set_nodelay(&mut self, nodelay: bool) {
        self.nodelay = nodelay;
    }

    /// Resolve `host` and connect to the first address that accepts.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        tracer: &mut PhaseTracer,
    ) -> Result<TcpStream, ClientError> {
        let addrs = dns::resolve(host, port, tracer).await?;
        let mut last_err = None;
        for addr in addrs {
            tracer.connect_start(addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    tracer.connect_done(addr, Ok(()));
                    stream
                        .set_nodelay(self.nodelay)
                        .map_err(|source| ClientError::Connect { addr, source })?;
                    return Ok(stream);
                }
                Err(source) => {
                    tracer.connect_done(addr, Err(&source));
                    last_err = Some(ClientError::Connect { addr, source });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::NoAddress(host.to_string())))
    }
}
