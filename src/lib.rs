//! Loyalty Ledger Library
//! # Overview
//!
//! This library keeps a loyalty-points ledger for a set of logins and
//! reconciles uploaded orders with an external accrual processor, crediting
//! points once an order is processed.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (orders, balances, withdrawals, errors)
//! - [`cli`] - Command-line and environment configuration
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - `LedgerStore` and `AccrualSource` seams
//!   - [`core::ledger`] - In-memory ledger store
//!   - [`core::order_service`] / [`core::balance_service`] - Request-path operations
//!   - [`core::reconcile`] - Background reconciliation worker
//! - [`accrual`] - HTTP client for the accrual processor
//!
//! # Order Lifecycle
//!
//! - **NEW**: Uploaded, not yet seen by the processor
//! - **PROCESSING**: The processor is computing the reward
//! - **INVALID**: Rejected by the processor (terminal)
//! - **PROCESSED**: Reward computed and credited (terminal)
//!
//! # Balance
//!
//! Each login has:
//! - `current`: Points available for withdrawal
//! - `withdrawn`: Total points ever withdrawn
//!
//! Both are never negative; a withdrawal moves points from `current` to
//! `withdrawn` atomically, and every processed accrual is credited at most
//! once.

// Module declarations
pub mod accrual;
pub mod cli;
pub mod core;
pub mod types;

pub use accrual::{AccrualClient, PollOutcome};
pub use crate::core::{
    BalanceService, InMemoryLedger, LedgerStore, OrderService, ReconciliationWorker, UserService,
    WorkerConfig,
};
pub use types::{
    AccrualStatus, Balance, LedgerError, OrderStatus, OrderView, StatusChange, WithdrawalRequest,
    WithdrawalView,
};
