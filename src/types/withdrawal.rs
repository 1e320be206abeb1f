//! Withdrawal types for the loyalty ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderNumber;

/// A request to spend points against a new order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithdrawalRequest {
    /// Number of the order paid with points
    ///
    /// Must be unique across all withdrawals.
    pub order: OrderNumber,

    /// Points to withdraw; must be positive
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub sum: Decimal,
}

impl WithdrawalRequest {
    /// Convenience constructor
    pub fn new(order: impl Into<OrderNumber>, sum: Decimal) -> Self {
        WithdrawalRequest {
            order: order.into(),
            sum,
        }
    }
}

/// An accepted withdrawal as shown to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalView {
    /// Order number the points were spent on
    pub order: OrderNumber,

    /// Points withdrawn
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub sum: Decimal,

    /// When the withdrawal was committed
    pub processed_at: DateTime<Utc>,
}
