//! Order-related types for the loyalty ledger
//!
//! This module defines order identifiers, the closed set of order and
//! accrual-processor statuses, and the views handed to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// User login
///
/// Unique across the system; owns exactly one balance.
pub type Login = String;

/// Externally supplied order number
///
/// Order numbers and withdrawal numbers live in separate namespaces.
pub type OrderNumber = String;

/// Lifecycle status of an uploaded order
///
/// Transitions are monotonic: `New → Processing → {Processed | Invalid}`.
/// Once an order is terminal it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Uploaded, not yet seen by the accrual processor
    New,

    /// The accrual processor registered the order and is computing the reward
    Processing,

    /// The accrual processor refused to reward the order (terminal)
    Invalid,

    /// The accrual processor computed the reward (terminal)
    Processed,
}

impl OrderStatus {
    /// Whether the order will never be polled again
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Position in the lifecycle; a status may only be replaced by one of higher rank
    ///
    /// Both terminal statuses share the top rank, so neither can replace
    /// the other.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid | OrderStatus::Processed => 2,
        }
    }

    /// Whether an order in `self` may move to `next`
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Storage representation of the status
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(LedgerError::invalid_status(other)),
        }
    }
}

/// Status reported by the accrual processor for a single order
///
/// Unknown strings fail to deserialize, so a typo in the processor's
/// response can never park an order in a status nobody polls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    /// Registered, calculation not started
    Registered,

    /// Calculation in progress
    Processing,

    /// Rejected, no reward will be granted
    Invalid,

    /// Calculation finished, reward is final
    Processed,
}

impl AccrualStatus {
    /// Whether the processor's answer is final
    pub fn is_terminal(self) -> bool {
        matches!(self, AccrualStatus::Invalid | AccrualStatus::Processed)
    }

    /// Map the processor status onto the order lifecycle
    ///
    /// `Registered` and `Processing` both mean "keep polling".
    pub fn to_order_status(self) -> OrderStatus {
        match self {
            AccrualStatus::Registered | AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

impl fmt::Display for AccrualStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccrualStatus::Registered => "REGISTERED",
            AccrualStatus::Processing => "PROCESSING",
            AccrualStatus::Invalid => "INVALID",
            AccrualStatus::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

/// An order as shown to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    /// Order number
    pub number: OrderNumber,

    /// Current lifecycle status
    pub status: OrderStatus,

    /// Points awarded; only present once the order is `PROCESSED`
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::arbitrary_precision_option"
    )]
    pub accrual: Option<Decimal>,

    /// When the order was uploaded
    pub uploaded_at: DateTime<Utc>,
}

/// An order the reconciliation worker still has to poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    /// Order number to poll
    pub number: OrderNumber,

    /// Owner whose balance receives the accrual
    pub login: Login,
}

/// Outcome of an order status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The row changed; `credited` points were added to the owner's balance
    Applied {
        /// Amount added to the balance (zero unless the order became `PROCESSED`)
        credited: Decimal,
    },

    /// The status did not move forward, or the order belongs to another login
    Unchanged,
}
