//! Core business logic module
//!
//! This module contains the ledger and its reconciliation loop:
//! - `traits` - Seams for interchangeable stores and accrual sources
//! - `ledger` - In-memory ledger store
//! - `postgres` - PostgreSQL ledger store (feature `postgres`)
//! - `order_service`, `balance_service`, `user_service` - Request-path operations
//! - `reconcile` - Background worker polling the accrual processor
//! - `deadline` - Per-request timeouts for store calls

pub mod balance_service;
pub mod deadline;
pub mod ledger;
pub mod order_service;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod reconcile;
pub mod traits;
pub mod user_service;

pub use balance_service::BalanceService;
pub use ledger::InMemoryLedger;
pub use order_service::OrderService;
#[cfg(feature = "postgres")]
pub use postgres::PgLedgerStore;
pub use reconcile::{CycleReport, ReconciliationWorker, WorkerConfig};
pub use traits::{AccrualSource, LedgerStore};
pub use user_service::UserService;
