//! In-memory ledger store
//!
//! This module provides `InMemoryLedger`, a `LedgerStore` backed by
//! concurrent hash maps. It is the default backend and the one the test
//! suite runs against.
//!
//! # Design
//!
//! Each logical table is a `DashMap`, so operations on different rows run in
//! parallel and operations on the same row are serialized by the map's
//! per-shard locks. Multi-row operations validate everything first and only
//! then write, all while holding the row guards they touch, which gives them
//! the all-or-nothing behavior of a database transaction.
//!
//! # Lock Order
//!
//! ```text
//! commit gate  →  orders  →  balances  →  withdrawals
//! ```
//!
//! Every operation acquires locks in this order and never the reverse, so
//! no two operations can wait on each other. Mutations take the commit gate
//! shared; full-table scans take it exclusively so they never observe half
//! of a multi-row commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::traits::LedgerStore;
use crate::types::{
    Balance, LedgerError, Login, OrderNumber, OrderStatus, OrderView, PendingOrder, StatusChange,
    WithdrawalView,
};

/// Stored order row
#[derive(Debug, Clone)]
struct OrderRecord {
    login: Login,
    status: OrderStatus,
    accrual: Option<Decimal>,
    uploaded_at: DateTime<Utc>,
    /// Monotonic change counter; orders listing sorts on it
    revision: u64,
}

/// Stored withdrawal row
#[derive(Debug, Clone)]
struct WithdrawalRecord {
    login: Login,
    sum: Decimal,
    processed_at: DateTime<Utc>,
    revision: u64,
}

/// Thread-safe in-memory implementation of [`LedgerStore`]
///
/// Registered users are the keys of the balances table: a login exists
/// exactly when it has a balance row.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    gate: RwLock<()>,
    orders: DashMap<OrderNumber, OrderRecord>,
    balances: DashMap<Login, Balance>,
    withdrawals: DashMap<OrderNumber, WithdrawalRecord>,
    revision: AtomicU64,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn open_account(&self, login: &str) -> Result<(), LedgerError> {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        match self.balances.entry(login.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::user_already_exists(login)),
            Entry::Vacant(slot) => {
                slot.insert(Balance::new());
                info!(login, "user registered");
                Ok(())
            }
        }
    }

    fn insert_order(&self, login: &str, number: &str) -> Result<(), LedgerError> {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        if !self.balances.contains_key(login) {
            return Err(LedgerError::user_not_found(login));
        }

        // The entry guard is the uniqueness constraint: the ownership check
        // and the insert happen under the same shard lock.
        match self.orders.entry(number.to_string()) {
            Entry::Occupied(existing) if existing.get().login == login => {
                Err(LedgerError::order_already_exists(number))
            }
            Entry::Occupied(_) => Err(LedgerError::order_owned_by_other_user(number)),
            Entry::Vacant(slot) => {
                slot.insert(OrderRecord {
                    login: login.to_string(),
                    status: OrderStatus::New,
                    accrual: None,
                    uploaded_at: Utc::now(),
                    revision: self.next_revision(),
                });
                debug!(login, order = number, "order created");
                Ok(())
            }
        }
    }

    fn scan_orders(&self, login: &str) -> Result<Vec<OrderView>, LedgerError> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        let mut rows: Vec<(u64, OrderView)> = self
            .orders
            .iter()
            .filter(|entry| entry.value().login == login)
            .map(|entry| {
                let record = entry.value();
                (
                    record.revision,
                    OrderView {
                        number: entry.key().clone(),
                        status: record.status,
                        accrual: record.accrual,
                        uploaded_at: record.uploaded_at,
                    },
                )
            })
            .collect();

        if rows.is_empty() {
            debug!(login, "no orders for login");
            return Err(LedgerError::no_orders(login));
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, view)| view).collect())
    }

    fn read_balance(&self, login: &str) -> Result<Balance, LedgerError> {
        self.balances
            .get(login)
            .map(|balance| *balance)
            .ok_or_else(|| LedgerError::user_not_found(login))
    }

    fn debit(&self, login: &str, number: &str, amount: Decimal) -> Result<(), LedgerError> {
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        // Holding the balance row serializes withdrawals of the same login.
        let mut balance = self
            .balances
            .get_mut(login)
            .ok_or_else(|| LedgerError::user_not_found(login))?;

        if amount > balance.current {
            return Err(LedgerError::insufficient_funds(
                login,
                balance.current,
                amount,
            ));
        }

        let current = balance
            .current
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::storage("balance underflow"))?;
        let withdrawn = balance
            .withdrawn
            .checked_add(amount)
            .ok_or_else(|| LedgerError::storage("withdrawn total overflow"))?;

        match self.withdrawals.entry(number.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::withdrawal_already_exists(number)),
            Entry::Vacant(slot) => {
                slot.insert(WithdrawalRecord {
                    login: login.to_string(),
                    sum: amount,
                    processed_at: Utc::now(),
                    revision: self.next_revision(),
                });
                balance.current = current;
                balance.withdrawn = withdrawn;
                info!(login, order = number, %amount, %current, "withdrawal accepted");
                Ok(())
            }
        }
    }

    fn scan_withdrawals(&self, login: &str) -> Result<Vec<WithdrawalView>, LedgerError> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        let mut rows: Vec<(u64, WithdrawalView)> = self
            .withdrawals
            .iter()
            .filter(|entry| entry.value().login == login)
            .map(|entry| {
                let record = entry.value();
                (
                    record.revision,
                    WithdrawalView {
                        order: entry.key().clone(),
                        sum: record.sum,
                        processed_at: record.processed_at,
                    },
                )
            })
            .collect();

        if rows.is_empty() {
            return Err(LedgerError::no_withdrawals(login));
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, view)| view).collect())
    }

    fn apply_status(
        &self,
        login: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<StatusChange, LedgerError> {
        if accrual < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount { amount: accrual });
        }

        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);

        let Some(mut order) = self.orders.get_mut(number) else {
            return Ok(StatusChange::Unchanged);
        };

        if order.login != login || !order.status.can_advance_to(status) {
            return Ok(StatusChange::Unchanged);
        }

        let credited = if status == OrderStatus::Processed && accrual > Decimal::ZERO {
            accrual
        } else {
            Decimal::ZERO
        };

        if !credited.is_zero() {
            let mut balance = self
                .balances
                .get_mut(login)
                .ok_or_else(|| LedgerError::user_not_found(login))?;
            balance.current = balance
                .current
                .checked_add(credited)
                .ok_or_else(|| LedgerError::storage("balance overflow"))?;
            debug!(login, order = number, %credited, current = %balance.current, "balance credited");
        }

        order.status = status;
        order.accrual = (status == OrderStatus::Processed).then_some(accrual);
        order.revision = self.next_revision();

        Ok(StatusChange::Applied { credited })
    }

    fn scan_pending(&self) -> Result<Vec<PendingOrder>, LedgerError> {
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        let mut rows: Vec<(u64, PendingOrder)> = self
            .orders
            .iter()
            .filter(|entry| !entry.value().status.is_terminal())
            .map(|entry| {
                (
                    entry.value().revision,
                    PendingOrder {
                        number: entry.key().clone(),
                        login: entry.value().login.clone(),
                    },
                )
            })
            .collect();

        if rows.is_empty() {
            return Err(LedgerError::NoUnprocessedOrders);
        }

        // Least recently touched first, so every order gets its turn.
        rows.sort_by_key(|(revision, _)| *revision);
        Ok(rows.into_iter().map(|(_, pending)| pending).collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn register_user(&self, login: &str) -> Result<(), LedgerError> {
        self.open_account(login)
    }

    async fn create_order(&self, login: &str, number: &str) -> Result<(), LedgerError> {
        self.insert_order(login, number)
    }

    async fn list_orders(&self, login: &str) -> Result<Vec<OrderView>, LedgerError> {
        self.scan_orders(login)
    }

    async fn get_balance(&self, login: &str) -> Result<Balance, LedgerError> {
        self.read_balance(login)
    }

    async fn create_withdrawal(
        &self,
        login: &str,
        number: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.debit(login, number, amount)
    }

    async fn list_withdrawals(&self, login: &str) -> Result<Vec<WithdrawalView>, LedgerError> {
        self.scan_withdrawals(login)
    }

    async fn update_order_status(
        &self,
        login: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<StatusChange, LedgerError> {
        self.apply_status(login, number, status, accrual)
    }

    async fn list_non_terminal_orders(&self) -> Result<Vec<PendingOrder>, LedgerError> {
        self.scan_pending()
    }
}
