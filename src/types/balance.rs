//! Balance types for the loyalty ledger

use rust_decimal::Decimal;
use serde::Serialize;

/// Point balance of a single login
///
/// Both fields are non-negative at all times. `current` grows only when an
/// order is processed with a positive accrual and shrinks only when a
/// withdrawal is accepted; `withdrawn` grows by exactly the same amounts
/// `current` loses to withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Spendable points
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub current: Decimal,

    /// Total points ever withdrawn
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub withdrawn: Decimal,
}

impl Balance {
    /// Create a zeroed balance, as opened at registration
    pub fn new() -> Self {
        Balance {
            current: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new()
    }
}
