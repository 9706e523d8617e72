mod config;

use crate::config::{Config, ConfigError, FileConfig, Overrides};
use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use loadtracer_client::{Dispatcher, Http1Issuer, Http2Issuer, Protocol, Report, RequestIssuer};
use slog::{info, o, warn, Drain, Level};
use tokio::runtime::Runtime;

fn root_logger(level: Level) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let async_drain = slog_async::Async::new(drain).build().fuse();
    let level_filter = slog::LevelFilter(async_drain, level).fuse();
    slog::Logger::root(level_filter, o!())
}

fn cli() -> Command {
    Command::new("loadtracer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Benn Sundsrud <benn.sundsrud@gmail.com>")
        .about("Send a batch of requests to one endpoint and break down where the time went")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Endpoint to request"),
        )
        .arg(
            Arg::new("requests")
                .short('n')
                .long("requests")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Number of requests to send [default: 300]"),
        )
        .arg(
            Arg::new("http")
                .long("http")
                .value_name("VERSION")
                .help("HTTP version to use, 1 or 2 [default: 1]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to config file"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Maximum requests in flight at once [default: all]"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Per-request timeout in seconds [default: 300]"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets verbosity level"),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config, ConfigError> {
    let file = match matches.get_one::<String>("config") {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        url: matches.get_one::<String>("url").cloned(),
        requests: matches.get_one::<usize>("requests").copied(),
        http: matches.get_one::<String>("http").cloned(),
        concurrency: matches.get_one::<usize>("concurrency").copied(),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
    };
    Config::resolve(file, overrides)
}

async fn dispatch<I: RequestIssuer>(issuer: I, config: &Config) -> Report {
    Dispatcher::new(issuer)
        .with_concurrency(config.concurrency)
        .run(config.requests)
        .await
        .report()
}

fn run(logger: &slog::Logger, config: Config) -> Result<()> {
    info!(logger, "starting run";
        "url" => %config.target,
        "requests" => config.requests,
        "protocol" => %config.protocol);
    let rt = Runtime::new().context("Could not start the runtime")?;
    let report = rt.block_on(async {
        let target = config.target.clone();
        let options = config.options.clone();
        match config.protocol {
            Protocol::Http1 => dispatch(Http1Issuer::new(target, options), &config).await,
            Protocol::Http2 => dispatch(Http2Issuer::new(target, options), &config).await,
        }
    });
    println!("{}", report);
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    let level = match matches.get_count("v") {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => {
            eprintln!("WARNING: more than -vvv is ignored");
            Level::Trace
        }
    };
    let config = match load_config(&matches) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Could not load config: {}", e);
            std::process::exit(1);
        }
    };

    let code = {
        let logger = root_logger(level);
        let _scope_guard = slog_scope::set_global_logger(logger.clone());
        if let Err(e) = slog_stdlog::init() {
            warn!(logger, "library logging unavailable"; "error" => %e);
        }
        match run(&logger, config) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error running requests: {:#}", e);
                1
            }
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_arguments() {
        let m = cli()
            .try_get_matches_from(vec![
                "loadtracer", "-u", "http://127.0.0.1/", "-n", "20", "--http", "2", "-vv",
            ])
            .unwrap();
        assert_eq!(m.get_count("v"), 2);
        let config = load_config(&m).unwrap();
        assert_eq!(config.requests, 20);
        assert_eq!(config.protocol, Protocol::Http2);
    }

    #[test]
    fn rejects_non_numeric_counts() {
        assert!(cli()
            .try_get_matches_from(vec!["loadtracer", "-n", "many"])
            .is_err());
    }
}
