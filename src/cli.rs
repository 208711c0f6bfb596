//! Command-line interface definitions.
//!
//! Every option can also be given through the environment variable named in
//! its help text.

use crate::config::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_RETRY_DELAY,
    RetryPolicy, ScrapeSettings,
};
use crate::scrapers::http::DEFAULT_USER_AGENT;
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Scrape every configured language into ./horoscopes.db and export JSON
/// daily_horoscopes scrape --export-dir ./out
///
/// # Only two languages, gentler on the source
/// daily_horoscopes scrape --languages english,hindi --concurrency 2
///
/// # Serve today's records
/// daily_horoscopes serve --bind 127.0.0.1:5001
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "DATABASE_PATH", default_value = "horoscopes.db")]
    pub database: PathBuf,

    /// Optional YAML catalogue replacing the built-in language sources
    #[arg(short, long, global = true, env = "HOROSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch today's horoscopes for every language and sign
    Scrape(ScrapeArgs),
    /// Serve stored horoscopes over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Maximum number of pages scraped at the same time
    #[arg(
        long,
        env = "SCRAPE_CONCURRENCY",
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub concurrency: usize,

    /// Attempts per page before recording a failure
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Delay between two attempts of the same page, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    pub retry_delay_ms: u64,

    /// Timeout of one page load, in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_NAVIGATION_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Directory receiving horoscopes_<language>.json
    #[arg(long, default_value = ".")]
    pub export_dir: PathBuf,

    /// Skip the JSON export
    #[arg(long)]
    pub no_export: bool,

    /// Restrict the run to these languages (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub languages: Vec<String>,

    /// User agent sent with every request
    #[arg(long, env = "SCRAPER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl ScrapeArgs {
    pub fn settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                navigation_timeout: Duration::from_secs(self.timeout_secs),
            },
            export_dir: (!self.no_export).then(|| self.export_dir.clone()),
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address the API listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:5001")]
    pub bind: SocketAddr,
}
