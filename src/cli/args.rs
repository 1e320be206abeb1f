use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::core::deadline::DEFAULT_REQUEST_TIMEOUT;
use crate::core::reconcile::{WorkerConfig, DEFAULT_POLL_INTERVAL};

const DEFAULT_ACCRUAL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Loyalty points ledger with accrual reconciliation
#[derive(Parser, Debug)]
#[command(name = "loyalty-ledger")]
#[command(about = "Loyalty points ledger reconciling orders with an accrual system", long_about = None)]
pub struct Config {
    /// Base address of the accrual processor
    #[arg(
        short = 'r',
        long = "accrual-address",
        env = "ACCRUAL_SYSTEM_ADDRESS",
        value_name = "URL",
        default_value = "http://localhost:8080",
        value_parser = parse_accrual_address,
        help = "Accrual system base URL, e.g. http://localhost:8080"
    )]
    pub accrual_address: Url,

    /// PostgreSQL connection string; the in-memory ledger is used when absent
    #[arg(
        short = 'd',
        long = "database-uri",
        env = "DATABASE_URI",
        value_name = "URI",
        help = "PostgreSQL connection string (requires the 'postgres' feature)"
    )]
    pub database_uri: Option<String>,

    /// Pause between reconciliation cycles
    #[arg(
        long = "poll-interval-ms",
        value_name = "MS",
        help = "Milliseconds between reconciliation cycles (default: 1000)"
    )]
    pub poll_interval_ms: Option<u64>,

    /// Bound for one accrual request
    #[arg(
        long = "accrual-timeout-ms",
        value_name = "MS",
        help = "Timeout of one accrual request in milliseconds (default: 5000)"
    )]
    pub accrual_timeout_ms: Option<u64>,

    /// Bound for one store call
    #[arg(
        long = "request-timeout-ms",
        value_name = "MS",
        help = "Timeout of one storage call in milliseconds (default: 1000)"
    )]
    pub request_timeout_ms: Option<u64>,

    /// Backoff when a 429 has no usable Retry-After
    #[arg(
        long = "retry-after-default-secs",
        value_name = "SECS",
        help = "Backoff after a 429 without a usable Retry-After header (default: 30)"
    )]
    pub retry_after_default_secs: Option<u64>,

    /// Size of the database connection pool
    #[arg(
        long = "max-connections",
        value_name = "COUNT",
        help = "Maximum number of database connections (default: 10)"
    )]
    pub max_connections: Option<u32>,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "info",
        help = "Log filter such as 'info' or 'loyalty_ledger=debug'"
    )]
    pub log_level: String,
}

/// Accept only absolute http(s) addresses with a host
fn parse_accrual_address(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| format!("wrong accrual address '{value}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "wrong accrual address '{value}': scheme must be http or https"
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("wrong accrual address '{value}': missing host"));
    }
    Ok(url)
}

/// Ledger backend selected by the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend<'a> {
    /// Process-local ledger; starts empty and is lost on exit
    InMemory,

    /// PostgreSQL ledger at the given connection string
    Postgres(&'a str),
}

/// Use `value` unless it is absent or zero
fn or_default<T: Default + PartialEq>(value: Option<T>, default: T) -> T {
    match value {
        Some(v) if v != T::default() => v,
        _ => default,
    }
}

impl Config {
    /// Backend chosen by `--database-uri` / `DATABASE_URI`
    ///
    /// A blank connection string counts as absent.
    pub fn ledger_backend(&self) -> LedgerBackend<'_> {
        match self.database_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => LedgerBackend::Postgres(uri),
            _ => LedgerBackend::InMemory,
        }
    }

    /// Create a WorkerConfig from the timing arguments
    ///
    /// Zero or missing values fall back to the defaults.
    pub fn to_worker_config(&self) -> WorkerConfig {
        WorkerConfig::new(self.poll_interval(), self.request_timeout())
    }

    /// Pause between reconciliation cycles
    pub fn poll_interval(&self) -> Duration {
        or_default(
            self.poll_interval_ms.map(Duration::from_millis),
            DEFAULT_POLL_INTERVAL,
        )
    }

    /// Timeout of one accrual request
    pub fn accrual_timeout(&self) -> Duration {
        or_default(
            self.accrual_timeout_ms.map(Duration::from_millis),
            DEFAULT_ACCRUAL_TIMEOUT,
        )
    }

    /// Timeout of one store call
    pub fn request_timeout(&self) -> Duration {
        or_default(
            self.request_timeout_ms.map(Duration::from_millis),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Backoff after a 429 without a usable Retry-After
    pub fn retry_after_default(&self) -> Duration {
        or_default(
            self.retry_after_default_secs.map(Duration::from_secs),
            DEFAULT_RETRY_AFTER,
        )
    }

    /// Size of the database connection pool
    pub fn max_connections(&self) -> u32 {
        or_default(self.max_connections, DEFAULT_MAX_CONNECTIONS)
    }
}
