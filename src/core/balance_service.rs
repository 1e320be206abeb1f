//! Balance and withdrawal operations exposed to request handlers

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::info;

use super::deadline::{within, DEFAULT_REQUEST_TIMEOUT};
use super::traits::LedgerStore;
use crate::types::{Balance, LedgerError, WithdrawalRequest, WithdrawalView};

/// Reads balances and spends points on behalf of a login
///
/// The funds check and the debit happen inside the store as one atomic
/// step; this service never reads a balance to decide a withdrawal.
#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
    request_timeout: Duration,
}

impl BalanceService {
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

    /// Current and withdrawn totals of `login`
    pub async fn get_current_balance(&self, login: &str) -> Result<Balance, LedgerError> {
        within(
            "get_balance",
            self.request_timeout,
            self.store.get_balance(login),
        )
        .await
    }

    /// Withdraw `request.sum` points against order `request.order`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Balance debited and withdrawal recorded
    /// * `Err(LedgerError::InvalidAmount)` - The sum is zero or negative
    /// * `Err(LedgerError::InsufficientFunds)` - The sum exceeds the current balance
    /// * `Err(LedgerError::WithdrawalAlreadyExists)` - The withdrawal number is taken
    pub async fn create_withdrawal(
        &self,
        login: &str,
        request: WithdrawalRequest,
    ) -> Result<(), LedgerError> {
        if request.sum <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: request.sum,
            });
        }

        within(
            "create_withdrawal",
            self.request_timeout,
            self.store
                .create_withdrawal(login, &request.order, request.sum),
        )
        .await?;

        info!(login, order = %request.order, sum = %request.sum, "points withdrawn");
        Ok(())
    }

    /// Withdrawals of `login`, most recent first
    ///
    /// Returns `Err(LedgerError::NoWithdrawals)` when the login has none.
    pub async fn list_withdrawals(&self, login: &str) -> Result<Vec<WithdrawalView>, LedgerError> {
        within(
            "list_withdrawals",
            self.request_timeout,
            self.store.list_withdrawals(login),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryLedger;
    use crate::types::OrderStatus;
    use rstest::rstest;

    /// `alice` with 100.00 points
    async fn funded() -> BalanceService {
        let store = Arc::new(InMemoryLedger::new());
        store.register_user("alice").await.unwrap();
        store.create_order("alice", "79927398713").await.unwrap();
        store
            .update_order_status("alice", "79927398713", OrderStatus::Processed, Decimal::new(10000, 2))
            .await
            .unwrap();
        BalanceService::new(store)
    }

    #[tokio::test]
    async fn test_overdraw_rejected() {
        let balances = funded().await;

        let result = balances
            .create_withdrawal("alice", WithdrawalRequest::new("1234", Decimal::new(15000, 2)))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        let balance = balances.get_current_balance("alice").await.unwrap();
        assert_eq!(balance.current, Decimal::new(10000, 2));
        assert_eq!(balance.withdrawn, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_withdraw_then_list() {
        let balances = funded().await;

        balances
            .create_withdrawal("alice", WithdrawalRequest::new("5678", Decimal::new(4000, 2)))
            .await
            .unwrap();

        let balance = balances.get_current_balance("alice").await.unwrap();
        assert_eq!(balance.current, Decimal::new(6000, 2));
        assert_eq!(balance.withdrawn, Decimal::new(4000, 2));
        let withdrawals = balances.list_withdrawals("alice").await.unwrap();
        assert_eq!(withdrawals[0].order, "5678");
        assert_eq!(withdrawals[0].sum, Decimal::new(4000, 2));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-1, 0))]
    #[tokio::test]
    async fn test_non_positive_sum_rejected(#[case] sum: Decimal) {
        let balances = funded().await;

        let result = balances
            .create_withdrawal("alice", WithdrawalRequest::new("5678", sum))
            .await;

        assert_eq!(result, Err(LedgerError::InvalidAmount { amount: sum }));
        assert_eq!(
            balances.list_withdrawals("alice").await,
            Err(LedgerError::no_withdrawals("alice"))
        );
    }
}
