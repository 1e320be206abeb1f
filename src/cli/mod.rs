// CLI module
// Command-line and environment configuration

mod args;

pub use args::{Config, LedgerBackend};

use clap::Parser;

/// Parse configuration from command-line arguments and the environment
///
/// Flags take precedence over `ACCRUAL_SYSTEM_ADDRESS` and `DATABASE_URI`.
/// If parsing fails (e.g., a malformed accrual address, or --help), clap
/// prints an error or help text and exits the process.
///
/// # Returns
///
/// Returns a `Config` with the parsed values.
pub fn parse_args() -> Config {
    Config::parse()
}
