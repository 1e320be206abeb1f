//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `order`: order numbers, statuses and views
//! - `balance`: per-login point balance
//! - `withdrawal`: withdrawal requests and views
//! - `error`: error types for the ledger

pub mod balance;
pub mod error;
pub mod order;
pub mod withdrawal;

pub use balance::Balance;
pub use error::LedgerError;
pub use order::{
    AccrualStatus, Login, OrderNumber, OrderStatus, OrderView, PendingOrder, StatusChange,
};
pub use withdrawal::{WithdrawalRequest, WithdrawalView};
