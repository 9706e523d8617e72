use crate::error::ClientError;
use crate::tracer::PhaseTracer;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Resolve `host` to socket addresses, reporting the lookup to the tracer.
///
/// IP literals are returned as-is without a DNS phase.
pub async fn resolve(
    host: &str,
    port: u16,
    tracer: &mut PhaseTracer,
) -> Result<Vec<SocketAddr>, ClientError> {
    if let Some(addr) = try_parse_ipaddr(host) {
        return Ok(vec![SocketAddr::new(addr, port)]);
    }

    tracer.dns_start(host);
    let name = host.to_string();
    let resolved = tokio::task::spawn_blocking(move || {
        (name.as_str(), port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<_>>())
    })
    .await
    .map_err(io::Error::from)
    .and_then(|r| r);

    match resolved {
        Ok(addrs) if addrs.is_empty() => {
            let e = io::Error::new(io::ErrorKind::NotFound, "no addresses");
            tracer.dns_done(Err(&e));
            Err(ClientError::NoAddress(host.to_string()))
        }
        Ok(addrs) => {
            tracer.dns_done(Ok(addrs.len()));
            Ok(addrs)
        }
        Err(e) => {
            tracer.dns_done(Err(&e));
            Err(ClientError::Dns {
                host: host.to_string(),
                source: e,
            })
        }
    }
}

fn try_parse_ipaddr(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
}
