//! Error types for the loyalty ledger
//!
//! This module defines every error that the ledger store and the services
//! built on top of it can return. Variants are grouped by how callers are
//! expected to react to them.
//!
//! # Error Categories
//!
//! - **Ownership conflicts**: the order or withdrawal number is already taken.
//!   Expected, never retried automatically.
//! - **Empty results**: a listing found nothing. Not a failure; lets callers
//!   tell "nothing found" apart from a broken read.
//! - **Funds**: a withdrawal would overdraw the balance.
//! - **Validation**: unknown login, malformed amount or status.
//! - **Infrastructure**: storage I/O failure or a request that ran past its
//!   deadline. Surfaced as internal errors to request callers.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger store and services
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The login is already registered
    #[error("User {login} already exists")]
    UserAlreadyExists {
        /// Login that was registered twice
        login: String,
    },

    /// The login has never been registered
    #[error("User {login} does not exist")]
    UserNotFound {
        /// Unknown login
        login: String,
    },

    /// The order was already uploaded by the same login
    ///
    /// Callers treat this as an idempotent success.
    #[error("Order {order} already uploaded by this user")]
    OrderAlreadyExists {
        /// Order number
        order: String,
    },

    /// The order number belongs to a different login
    ///
    /// This is a conflict; the existing order is left untouched.
    #[error("Order {order} already uploaded by another user")]
    OrderOwnedByOtherUser {
        /// Order number
        order: String,
    },

    /// A withdrawal with this order number was already accepted
    #[error("Withdrawal for order {order} already exists")]
    WithdrawalAlreadyExists {
        /// Withdrawal order number
        order: String,
    },

    /// The login has not uploaded any orders
    #[error("No orders uploaded by {login}")]
    NoOrders {
        /// Login that was queried
        login: String,
    },

    /// The login has not made any withdrawals
    #[error("No withdrawals made by {login}")]
    NoWithdrawals {
        /// Login that was queried
        login: String,
    },

    /// Every known order has reached a terminal status
    #[error("No unprocessed orders")]
    NoUnprocessedOrders,

    /// The withdrawal exceeds the current balance
    ///
    /// The balance is left unchanged.
    #[error("Insufficient funds for {login}: current {current}, requested {requested}")]
    InsufficientFunds {
        /// Login that attempted the withdrawal
        login: String,
        /// Balance at the moment of the check
        current: Decimal,
        /// Requested withdrawal sum
        requested: Decimal,
    },

    /// An amount outside its allowed range
    ///
    /// Raised for a withdrawal sum that is not positive and for a negative
    /// accrual handed to a status update.
    #[error("Invalid amount {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// A status string that is not part of the closed status set
    #[error("Invalid order status '{status}'")]
    InvalidStatus {
        /// The unrecognised status string
        status: String,
    },

    /// The storage backend failed
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// The operation did not complete within its deadline
    #[error("Operation {operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Deadline that was exceeded, in milliseconds
        millis: u64,
    },
}

impl LedgerError {
    /// Create a UserAlreadyExists error
    pub fn user_already_exists(login: &str) -> Self {
        LedgerError::UserAlreadyExists {
            login: login.to_string(),
        }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(login: &str) -> Self {
        LedgerError::UserNotFound {
            login: login.to_string(),
        }
    }

    /// Create an OrderAlreadyExists error
    pub fn order_already_exists(order: &str) -> Self {
        LedgerError::OrderAlreadyExists {
            order: order.to_string(),
        }
    }

    /// Create an OrderOwnedByOtherUser error
    pub fn order_owned_by_other_user(order: &str) -> Self {
        LedgerError::OrderOwnedByOtherUser {
            order: order.to_string(),
        }
    }

    /// Create a WithdrawalAlreadyExists error
    pub fn withdrawal_already_exists(order: &str) -> Self {
        LedgerError::WithdrawalAlreadyExists {
            order: order.to_string(),
        }
    }

    /// Create a NoOrders error
    pub fn no_orders(login: &str) -> Self {
        LedgerError::NoOrders {
            login: login.to_string(),
        }
    }

    /// Create a NoWithdrawals error
    pub fn no_withdrawals(login: &str) -> Self {
        LedgerError::NoWithdrawals {
            login: login.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(login: &str, current: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            login: login.to_string(),
            current,
            requested,
        }
    }

    /// Create an InvalidStatus error
    pub fn invalid_status(status: &str) -> Self {
        LedgerError::InvalidStatus {
            status: status.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: &str, millis: u64) -> Self {
        LedgerError::Timeout {
            operation: operation.to_string(),
            millis,
        }
    }

    /// Whether this error only signals that a listing came back empty
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            LedgerError::NoOrders { .. }
                | LedgerError::NoWithdrawals { .. }
                | LedgerError::NoUnprocessedOrders
        )
    }

    /// Whether this error is an ownership conflict on an order or withdrawal number
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::OrderAlreadyExists { .. }
                | LedgerError::OrderOwnedByOtherUser { .. }
                | LedgerError::WithdrawalAlreadyExists { .. }
                | LedgerError::UserAlreadyExists { .. }
        )
    }

    /// Whether this error comes from infrastructure rather than business rules
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage { .. } | LedgerError::Timeout { .. }
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        LedgerError::Storage {
            message: error.to_string(),
        }
    }
}
