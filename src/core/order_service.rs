//! Order operations exposed to request handlers
//!
//! `OrderService` is a thin layer over [`LedgerStore`]: it bounds every
//! call with the request deadline and logs outcomes. Ownership rules live
//! in the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::deadline::{within, DEFAULT_REQUEST_TIMEOUT};
use super::traits::LedgerStore;
use crate::types::{LedgerError, OrderView};

/// Uploads and lists orders on behalf of a login
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn LedgerStore>,
    request_timeout: Duration,
}

impl OrderService {
    /// Create a service with the default request deadline
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_timeout(store, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a service with a custom request deadline
    pub fn with_timeout(store: Arc<dyn LedgerStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }

    /// Upload order `number` for `login`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The order was accepted with status `NEW`
    /// * `Err(LedgerError::OrderAlreadyExists)` - `login` uploaded it before; callers treat this as success
    /// * `Err(LedgerError::OrderOwnedByOtherUser)` - Another login owns the number
    /// * `Err(LedgerError::Timeout)` - The store did not answer in time
    pub async fn create_order(&self, login: &str, number: &str) -> Result<(), LedgerError> {
        let result = within(
            "create_order",
            self.request_timeout,
            self.store.create_order(login, number),
        )
        .await;

        match &result {
            Ok(()) => info!(login, order = number, "order accepted"),
            Err(e) if e.is_conflict() => debug!(login, order = number, error = %e, "order rejected"),
            Err(_) => {}
        }
        result
    }

    /// Orders of `login`, most recently changed first
    ///
    /// Returns `Err(LedgerError::NoOrders)` when the login has none.
    pub async fn list_orders(&self, login: &str) -> Result<Vec<OrderView>, LedgerError> {
        within(
            "list_orders",
            self.request_timeout,
            self.store.list_orders(login),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryLedger;
    use crate::types::OrderStatus;

    async fn service() -> OrderService {
        let store = Arc::new(InMemoryLedger::new());
        store.register_user("alice").await.unwrap();
        store.register_user("bob").await.unwrap();
        OrderService::new(store)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let orders = service().await;

        orders.create_order("alice", "12345678903").await.unwrap();
        let listed = orders.list_orders("alice").await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].number, "12345678903");
        assert_eq!(listed[0].status, OrderStatus::New);
        assert_eq!(listed[0].accrual, None);
    }

    #[tokio::test]
    async fn test_duplicate_outcomes_are_distinct() {
        let orders = service().await;
        orders.create_order("alice", "12345678903").await.unwrap();

        let same = orders.create_order("alice", "12345678903").await;
        let other = orders.create_order("bob", "12345678903").await;

        assert_eq!(same, Err(LedgerError::order_already_exists("12345678903")));
        assert_eq!(
            other,
            Err(LedgerError::order_owned_by_other_user("12345678903"))
        );
    }

    #[tokio::test]
    async fn test_list_without_orders() {
        let orders = service().await;

        assert_eq!(
            orders.list_orders("bob").await,
            Err(LedgerError::no_orders("bob"))
        );
    }
}
