//! Accrual processor integration
//!
//! - `outcome` - classification of processor responses into [`PollOutcome`]
//! - `client` - the reqwest-based [`AccrualClient`]

mod client;
mod outcome;

pub use client::{AccrualClient, AccrualClientError};
pub use outcome::{classify, parse_retry_after, AccrualResponse, PollOutcome};
