//! Core traits for ledger storage and accrual polling
//!
//! These are the seams between the reconciliation core and its two
//! external collaborators: the storage engine and the accrual processor.
//! Both are object-safe so services and the worker can hold them as
//! `Arc<dyn ...>` and share them across tasks.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::accrual::PollOutcome;
use crate::types::{
    Balance, LedgerError, OrderStatus, OrderView, PendingOrder, StatusChange, WithdrawalView,
};

/// Durable storage for users, orders, balances and withdrawals
///
/// Every method is atomic: either all of its writes become visible or none
/// do. Cross-cutting invariants (balance never negative, one owner per order
/// number, one withdrawal per withdrawal number, accruals credited once) are
/// enforced here rather than by callers, so several processes may share the
/// same store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register a login together with a zeroed balance
    ///
    /// # Errors
    ///
    /// * `UserAlreadyExists` if the login is taken
    async fn register_user(&self, login: &str) -> Result<(), LedgerError>;

    /// Insert a new order with status `NEW`
    ///
    /// The ownership check and the insert are a single atomic step.
    ///
    /// # Errors
    ///
    /// * `OrderAlreadyExists` if `login` already uploaded this number
    /// * `OrderOwnedByOtherUser` if another login owns it
    /// * `UserNotFound` if `login` is not registered
    async fn create_order(&self, login: &str, number: &str) -> Result<(), LedgerError>;

    /// All orders of `login`, most recently changed first
    ///
    /// # Errors
    ///
    /// * `NoOrders` if the login has none
    async fn list_orders(&self, login: &str) -> Result<Vec<OrderView>, LedgerError>;

    /// Current and withdrawn totals of `login`
    ///
    /// # Errors
    ///
    /// * `UserNotFound` if `login` is not registered
    async fn get_balance(&self, login: &str) -> Result<Balance, LedgerError>;

    /// Debit `amount` from the balance of `login` and record the withdrawal
    ///
    /// # Errors
    ///
    /// * `InsufficientFunds` if `amount` exceeds the current balance
    /// * `WithdrawalAlreadyExists` if the withdrawal number is taken
    /// * `UserNotFound` if `login` is not registered
    async fn create_withdrawal(
        &self,
        login: &str,
        number: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError>;

    /// All withdrawals of `login`, most recent first
    ///
    /// # Errors
    ///
    /// * `NoWithdrawals` if the login has none
    async fn list_withdrawals(&self, login: &str) -> Result<Vec<WithdrawalView>, LedgerError>;

    /// Move an order to `status`, crediting `accrual` when it becomes `PROCESSED`
    ///
    /// Does nothing unless `status` ranks above the stored status (see
    /// [`OrderStatus::rank`]), so replaying the same result never credits
    /// twice and a stale answer never moves an order backwards.
    async fn update_order_status(
        &self,
        login: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<StatusChange, LedgerError>;

    /// Every order that is neither `PROCESSED` nor `INVALID`
    ///
    /// # Errors
    ///
    /// * `NoUnprocessedOrders` if there is nothing left to poll
    async fn list_non_terminal_orders(&self) -> Result<Vec<PendingOrder>, LedgerError>;
}

/// Source of accrual results for individual orders
///
/// Implemented by the HTTP client for the real processor and by scripted
/// fakes in tests.
#[async_trait]
pub trait AccrualSource: Send + Sync {
    /// Ask the processor about one order
    ///
    /// Never fails: every transport or protocol problem is folded into
    /// [`PollOutcome::TransientError`].
    async fn poll(&self, number: &str) -> PollOutcome;
}
