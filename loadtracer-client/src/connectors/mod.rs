mod http;
mod https;

pub use self::http::TracingConnector;
pub use self::https::{tls_config, MaybeTlsStream, TracingHttpsConnector};
