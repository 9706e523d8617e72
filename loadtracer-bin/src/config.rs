use loadtracer_client::{ClientError, ClientOptions, Protocol, Target, UnknownProtocol};
use serde::Deserialize;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REQUESTS: usize = 300;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum HttpVersion {
    Number(u8),
    Name(String),
}

impl HttpVersion {
    fn protocol(&self) -> Result<Protocol, UnknownProtocol> {
        match self {
            HttpVersion::Number(n) => n.to_string().parse(),
            HttpVersion::Name(s) => s.parse(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub requests: Option<usize>,
    pub http: Option<HttpVersion>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_idle_per_host: Option<usize>,
    pub max_conns_per_host: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub requests: Option<usize>,
    pub http: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub requests: usize,
    pub protocol: Protocol,
    pub concurrency: Option<NonZeroUsize>,
    pub options: ClientOptions,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("No url given on the command line or in the config file")]
    MissingUrl,
    #[error(transparent)]
    Url(#[from] ClientError),
    #[error(transparent)]
    Protocol(#[from] UnknownProtocol),
    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("Timeout must be at least 1 second")]
    ZeroTimeout,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Config, ConfigError> {
        let url = cli.url.or(file.url).ok_or(ConfigError::MissingUrl)?;
        let target = Target::parse(&url)?;

        let protocol = match (cli.http, file.http) {
            (Some(s), _) => s.parse()?,
            (None, Some(v)) => v.protocol()?,
            (None, None) => Protocol::Http1,
        };

        let concurrency = match cli.concurrency.or(file.concurrency) {
            Some(n) => Some(NonZeroUsize::new(n).ok_or(ConfigError::ZeroConcurrency)?),
            None => None,
        };

        let mut options = ClientOptions::default();
        match cli.timeout_secs.or(file.timeout_secs) {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => options.timeout = Duration::from_secs(secs),
            None => {}
        }
        if let Some(n) = file.max_idle_per_host {
            options.max_idle_per_host = n;
        }
        if let Some(n) = file.max_conns_per_host {
            options.max_conns_per_host = n;
        }
        if let Some(secs) = file.idle_timeout_secs {
            options.idle_timeout = Duration::from_secs(secs);
        }

        Ok(Config {
            target,
            requests: cli.requests.or(file.requests).unwrap_or(DEFAULT_REQUESTS),
            protocol,
            concurrency,
            options,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(s: &str) -> FileConfig {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn file_values_apply() {
        let file = parse(
            r#"
            url = "https://example.com/test-1mb"
            requests = 50
            http = 2
            concurrency = 8
            timeout_secs = 30
            max_idle_per_host = 4
            max_conns_per_host = 16
            idle_timeout_secs = 10
            "#,
        );
        let config = Config::resolve(file, Overrides::default()).unwrap();
        assert_eq!(config.target.host(), "example.com");
        assert_eq!(config.requests, 50);
        assert_eq!(config.protocol, Protocol::Http2);
        assert_eq!(config.concurrency, NonZeroUsize::new(8));
        assert_eq!(config.options.timeout, Duration::from_secs(30));
        assert_eq!(config.options.max_idle_per_host, 4);
        assert_eq!(config.options.max_conns_per_host, 16);
        assert_eq!(config.options.idle_timeout, Duration::from_secs(10));
    }

    #[test]
    fn command_line_wins() {
        let file = parse(
            r#"
            url = "https://example.com/"
            requests = 50
            http = "2"
            "#,
        );
        let cli = Overrides {
            url: Some("http://127.0.0.1:8080/".into()),
            requests: Some(5),
            http: Some("1".into()),
            ..Overrides::default()
        };
        let config = Config::resolve(file, cli).unwrap();
        assert_eq!(config.target.port(), 8080);
        assert_eq!(config.requests, 5);
        assert_eq!(config.protocol, Protocol::Http1);
    }

    #[test]
    fn defaults_without_file() {
        let cli = Overrides {
            url: Some("http://localhost/".into()),
            ..Overrides::default()
        };
        let config = Config::resolve(FileConfig::default(), cli).unwrap();
        assert_eq!(config.requests, DEFAULT_REQUESTS);
        assert_eq!(config.protocol, Protocol::Http1);
        assert_eq!(config.concurrency, None);
        assert_eq!(config.options.timeout, Duration::from_secs(300));
        assert_eq!(config.options.max_conns_per_host, 100);
    }

    #[test]
    fn rejects_bad_values() {
        match Config::resolve(FileConfig::default(), Overrides::default()) {
            Err(ConfigError::MissingUrl) => {}
            other => panic!("unexpected {:?}", other),
        }
        let cli = Overrides {
            url: Some("ftp://example.com/".into()),
            ..Overrides::default()
        };
        match Config::resolve(FileConfig::default(), cli) {
            Err(ConfigError::Url(ClientError::InvalidUrl { .. })) => {}
            other => panic!("unexpected {:?}", other),
        }
        let cli = Overrides {
            url: Some("http://example.com/".into()),
            http: Some("3".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(FileConfig::default(), cli),
            Err(ConfigError::Protocol(_))
        ));
        let cli = Overrides {
            url: Some("http://example.com/".into()),
            concurrency: Some(0),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(FileConfig::default(), cli),
            Err(ConfigError::ZeroConcurrency)
        ));
        let cli = Overrides {
            url: Some("http://example.com/".into()),
            timeout_secs: Some(0),
            ..Overrides::default()
        };
        assert!(matches!(
            Config::resolve(FileConfig::default(), cli),
            Err(ConfigError::ZeroTimeout)
        ));
        let file = parse("url = \"http://example.com/\"\ntimeout_secs = 0");
        assert!(matches!(
            Config::resolve(file, Overrides::default()),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("urls = \"http://x/\"").is_err());
    }
}
