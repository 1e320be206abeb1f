//! Accrual reconciliation worker
//!
//! This module provides `ReconciliationWorker`, the long-lived background
//! task that drives orders from `NEW` to a terminal status by polling the
//! accrual processor and crediting balances.
//!
//! # Cycle
//!
//! ```text
//! list_non_terminal_orders ──► for each order, sequentially:
//!                                 poll ──► Accepted   → update_order_status
//!                                      ├─► Unknown    → next order
//!                                      ├─► Transient  → next order
//!                                      └─► Throttled  → suspend, next order
//! sleep(poll_interval) ◄──────────────────────────────────────┘
//! ```
//!
//! The worker keeps no state between cycles: everything it needs is re-read
//! from the store, so a crash or restart loses nothing. Double crediting is
//! prevented by the store's status update being a no-op unless the status
//! moves forward.
//!
//! # Shutdown
//!
//! The worker observes its `CancellationToken` at every cycle boundary,
//! before each poll, during the inter-cycle sleep and during a throttle
//! backoff. A store update that has already started is always awaited.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::deadline::within;
use super::traits::{AccrualSource, LedgerStore};
use crate::accrual::PollOutcome;
use crate::types::{LedgerError, OrderStatus, PendingOrder, StatusChange};

/// Default pause between two cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound for a single store call made by the worker
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing of the reconciliation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Pause between the end of one cycle and the start of the next
    pub poll_interval: Duration,

    /// Deadline for each store call
    pub store_timeout: Duration,
}

impl WorkerConfig {
    /// Create a config, replacing zero durations with the defaults
    pub fn new(poll_interval: Duration, store_timeout: Duration) -> Self {
        let default = Self::default();
        Self {
            poll_interval: if poll_interval.is_zero() {
                default.poll_interval
            } else {
                poll_interval
            },
            store_timeout: if store_timeout.is_zero() {
                default.store_timeout
            } else {
                store_timeout
            },
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Orders the processor was asked about
    pub polled: usize,
    /// Status updates that changed a row
    pub applied: usize,
    /// Points added to balances
    pub credited: Decimal,
    /// Orders the processor did not know
    pub unknown: usize,
    /// Polls that failed transiently
    pub transient: usize,
    /// Throttle responses honoured
    pub throttled: usize,
    /// Store failures while applying a result
    pub failed: usize,
}

/// Background task reconciling order statuses with the accrual processor
pub struct ReconciliationWorker {
    store: Arc<dyn LedgerStore>,
    accrual: Arc<dyn AccrualSource>,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl ReconciliationWorker {
    /// Create a worker
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger shared with the request handlers
    /// * `accrual` - Source of processor results
    /// * `config` - Loop timing
    /// * `shutdown` - Cancelled to stop the worker
    pub fn new(
        store: Arc<dyn LedgerStore>,
        accrual: Arc<dyn AccrualSource>,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            accrual,
            config,
            shutdown,
        }
    }

    /// Run cycles until the shutdown token is cancelled
    pub async fn run(self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "reconciliation worker started"
        );

        while !self.shutdown.is_cancelled() {
            let report = self.run_cycle().await;
            if report.polled > 0 {
                debug!(
                    polled = report.polled,
                    applied = report.applied,
                    credited = %report.credited,
                    unknown = report.unknown,
                    transient = report.transient,
                    throttled = report.throttled,
                    failed = report.failed,
                    "reconciliation cycle finished"
                );
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("reconciliation worker stopped");
    }

    /// Run a single pass over every non-terminal order
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let pending = match within(
            "list_non_terminal_orders",
            self.config.store_timeout,
            self.store.list_non_terminal_orders(),
        )
        .await
        {
            Ok(pending) => pending,
            Err(LedgerError::NoUnprocessedOrders) => return report,
            Err(e) => {
                error!(error = %e, "failed to list unprocessed orders");
                return report;
            }
        };

        for order in pending {
            if self.shutdown.is_cancelled() {
                debug!("cycle interrupted by shutdown");
                break;
            }

            report.polled += 1;
            match self.accrual.poll(&order.number).await {
                PollOutcome::Accepted { status, accrual } => {
                    self.apply(&order, status.to_order_status(), accrual, &mut report)
                        .await;
                }
                PollOutcome::Unknown => report.unknown += 1,
                PollOutcome::TransientError { .. } => report.transient += 1,
                PollOutcome::Throttled { retry_after } => {
                    report.throttled += 1;
                    info!(
                        order = %order.number,
                        retry_after_secs = retry_after.as_secs(),
                        "polling suspended"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(retry_after) => {}
                    }
                }
            }
        }

        report
    }

    async fn apply(
        &self,
        order: &PendingOrder,
        status: OrderStatus,
        accrual: Decimal,
        report: &mut CycleReport,
    ) {
        let result = within(
            "update_order_status",
            self.config.store_timeout,
            self.store
                .update_order_status(&order.login, &order.number, status, accrual),
        )
        .await;

        match result {
            Ok(StatusChange::Applied { credited }) => {
                report.applied += 1;
                report.credited += credited;
                info!(
                    order = %order.number,
                    login = %order.login,
                    %status,
                    %credited,
                    "order status updated"
                );
            }
            Ok(StatusChange::Unchanged) => {}
            Err(e) => {
                report.failed += 1;
                warn!(
                    order = %order.number,
                    login = %order.login,
                    %status,
                    error = %e,
                    "failed to apply accrual result"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryLedger;
    use crate::types::{AccrualStatus, Balance, OrderView, WithdrawalView};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Accrual source answering from a per-order script
    ///
    /// Once an order's script runs out it answers `Unknown`.
    #[derive(Default)]
    struct ScriptedAccrual {
        scripts: Mutex<HashMap<String, VecDeque<PollOutcome>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedAccrual {
        fn script(self, number: &str, outcomes: Vec<PollOutcome>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(number.to_string(), outcomes.into());
            self
        }

        fn calls(&self) -> Vec<(String, Instant)> {
            self.calls.lock().unwrap().clone()
        }

        fn polled(&self) -> Vec<String> {
            self.calls().into_iter().map(|(number, _)| number).collect()
        }
    }

    #[async_trait]
    impl AccrualSource for ScriptedAccrual {
        async fn poll(&self, number: &str) -> PollOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((number.to_string(), Instant::now()));
            self.scripts
                .lock()
                .unwrap()
                .get_mut(number)
                .and_then(VecDeque::pop_front)
                .unwrap_or(PollOutcome::Unknown)
        }
    }

    /// Ledger whose status updates fail for one order number
    struct FailingUpdates {
        inner: InMemoryLedger,
        broken: String,
    }

    #[async_trait]
    impl LedgerStore for FailingUpdates {
        async fn register_user(&self, login: &str) -> Result<(), LedgerError> {
            self.inner.register_user(login).await
        }

        async fn create_order(&self, login: &str, number: &str) -> Result<(), LedgerError> {
            self.inner.create_order(login, number).await
        }

        async fn list_orders(&self, login: &str) -> Result<Vec<OrderView>, LedgerError> {
            self.inner.list_orders(login).await
        }

        async fn get_balance(&self, login: &str) -> Result<Balance, LedgerError> {
            self.inner.get_balance(login).await
        }

        async fn create_withdrawal(
            &self,
            login: &str,
            number: &str,
            amount: Decimal,
        ) -> Result<(), LedgerError> {
            self.inner.create_withdrawal(login, number, amount).await
        }

        async fn list_withdrawals(&self, login: &str) -> Result<Vec<WithdrawalView>, LedgerError> {
            self.inner.list_withdrawals(login).await
        }

        async fn update_order_status(
            &self,
            login: &str,
            number: &str,
            status: OrderStatus,
            accrual: Decimal,
        ) -> Result<StatusChange, LedgerError> {
            if number == self.broken {
                return Err(LedgerError::storage("connection reset"));
            }
            self.inner
                .update_order_status(login, number, status, accrual)
                .await
        }

        async fn list_non_terminal_orders(&self) -> Result<Vec<PendingOrder>, LedgerError> {
            self.inner.list_non_terminal_orders().await
        }
    }

    fn processed(accrual: i64) -> PollOutcome {
        PollOutcome::Accepted {
            status: AccrualStatus::Processed,
            accrual: Decimal::new(accrual, 0),
        }
    }

    async fn ledger_with_orders(login: &str, numbers: &[&str]) -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_user(login).await.unwrap();
        for number in numbers {
            ledger.create_order(login, number).await.unwrap();
        }
        ledger
    }

    fn worker(
        store: Arc<dyn LedgerStore>,
        accrual: Arc<ScriptedAccrual>,
        shutdown: CancellationToken,
    ) -> ReconciliationWorker {
        ReconciliationWorker::new(store, accrual, WorkerConfig::default(), shutdown)
    }

    async fn status_of(ledger: &InMemoryLedger, login: &str, number: &str) -> OrderStatus {
        ledger
            .list_orders(login)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.number == number)
            .map(|order| order.status)
            .unwrap()
    }

    #[tokio::test]
    async fn test_cycle_credits_processed_order() {
        let ledger = ledger_with_orders("alice", &["12345678903"]).await;
        let accrual = Arc::new(ScriptedAccrual::default().script("12345678903", vec![processed(50)]));
        let worker = worker(ledger.clone(), accrual, CancellationToken::new());

        let report = worker.run_cycle().await;

        assert_eq!(report.polled, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(report.credited, Decimal::new(50, 0));
        assert_eq!(
            status_of(&ledger, "alice", "12345678903").await,
            OrderStatus::Processed
        );
        assert_eq!(
            ledger.get_balance("alice").await.unwrap().current,
            Decimal::new(50, 0)
        );
        assert_eq!(
            ledger.list_non_terminal_orders().await,
            Err(LedgerError::NoUnprocessedOrders)
        );
    }

    #[tokio::test]
    async fn test_registered_maps_to_processing() {
        let ledger = ledger_with_orders("alice", &["1"]).await;
        let accrual = Arc::new(ScriptedAccrual::default().script(
            "1",
            vec![PollOutcome::Accepted {
                status: AccrualStatus::Registered,
                accrual: Decimal::ZERO,
            }],
        ));
        let worker = worker(ledger.clone(), accrual, CancellationToken::new());

        worker.run_cycle().await;

        assert_eq!(status_of(&ledger, "alice", "1").await, OrderStatus::Processing);
        assert_eq!(ledger.get_balance("alice").await.unwrap(), Balance::new());
    }

    #[tokio::test]
    async fn test_unknown_and_transient_leave_orders_untouched() {
        let ledger = ledger_with_orders("alice", &["1", "2"]).await;
        let accrual = Arc::new(
            ScriptedAccrual::default()
                .script("1", vec![PollOutcome::Unknown])
                .script("2", vec![PollOutcome::transient("503")]),
        );
        let worker = worker(ledger.clone(), accrual, CancellationToken::new());

        let report = worker.run_cycle().await;

        assert_eq!(report.unknown, 1);
        assert_eq!(report.transient, 1);
        assert_eq!(report.applied, 0);
        assert_eq!(status_of(&ledger, "alice", "1").await, OrderStatus::New);
        assert_eq!(status_of(&ledger, "alice", "2").await, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_terminal_order_does_not_stop_the_cycle() {
        let ledger = ledger_with_orders("alice", &["1", "2", "3"]).await;
        let accrual = Arc::new(
            ScriptedAccrual::default()
                .script(
                    "1",
                    vec![PollOutcome::Accepted {
                        status: AccrualStatus::Invalid,
                        accrual: Decimal::ZERO,
                    }],
                )
                .script("2", vec![processed(10)])
                .script(
                    "3",
                    vec![PollOutcome::Accepted {
                        status: AccrualStatus::Processing,
                        accrual: Decimal::ZERO,
                    }],
                ),
        );
        let worker = worker(ledger.clone(), accrual.clone(), CancellationToken::new());

        let first = worker.run_cycle().await;
        let second = worker.run_cycle().await;

        assert_eq!(first.polled, 3);
        assert_eq!(first.applied, 3);
        assert_eq!(second.polled, 1);
        assert_eq!(accrual.polled(), vec!["1", "2", "3", "3"]);
        assert_eq!(status_of(&ledger, "alice", "1").await, OrderStatus::Invalid);
        assert_eq!(status_of(&ledger, "alice", "2").await, OrderStatus::Processed);
        assert_eq!(status_of(&ledger, "alice", "3").await, OrderStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_suspends_before_next_order() {
        let ledger = ledger_with_orders("bob", &["999", "1000"]).await;
        let accrual = Arc::new(
            ScriptedAccrual::default()
                .script(
                    "999",
                    vec![PollOutcome::Throttled {
                        retry_after: Duration::from_secs(30),
                    }],
                )
                .script("1000", vec![processed(5)]),
        );
        let worker = worker(ledger.clone(), accrual.clone(), CancellationToken::new());

        let report = worker.run_cycle().await;

        let calls = accrual.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "999");
        assert_eq!(calls[1].0, "1000");
        assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(30));
        assert_eq!(report.throttled, 1);
        assert_eq!(status_of(&ledger, "bob", "999").await, OrderStatus::New);
        assert_eq!(status_of(&ledger, "bob", "1000").await, OrderStatus::Processed);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_abort_cycle() {
        let inner = InMemoryLedger::new();
        inner.register_user("alice").await.unwrap();
        inner.create_order("alice", "bad").await.unwrap();
        inner.create_order("alice", "good").await.unwrap();
        let store = Arc::new(FailingUpdates {
            inner,
            broken: "bad".to_string(),
        });
        let accrual = Arc::new(
            ScriptedAccrual::default()
                .script("bad", vec![processed(7)])
                .script("good", vec![processed(3)]),
        );
        let worker = worker(store.clone(), accrual, CancellationToken::new());

        let report = worker.run_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        let balance = store.get_balance("alice").await.unwrap();
        assert_eq!(balance.current, Decimal::new(3, 0));
        let pending = store.list_non_terminal_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number, "bad");
    }

    #[tokio::test]
    async fn test_empty_ledger_cycle_is_quiet() {
        let ledger = Arc::new(InMemoryLedger::new());
        let accrual = Arc::new(ScriptedAccrual::default());
        let worker = worker(ledger, accrual.clone(), CancellationToken::new());

        let report = worker.run_cycle().await;

        assert_eq!(report, CycleReport::default());
        assert!(accrual.polled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_throttle_backoff() {
        let ledger = ledger_with_orders("alice", &["A", "B"]).await;
        let accrual = Arc::new(ScriptedAccrual::default().script(
            "A",
            vec![PollOutcome::Throttled {
                retry_after: Duration::from_secs(3600),
            }],
        ));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker(ledger, accrual.clone(), shutdown.clone()).run());
        let started = Instant::now();

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(accrual.polled(), vec!["A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_cycles_until_cancelled() {
        let ledger = ledger_with_orders("alice", &["1"]).await;
        let accrual = Arc::new(ScriptedAccrual::default().script(
            "1",
            vec![PollOutcome::Unknown, PollOutcome::Unknown, processed(25)],
        ));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker(ledger.clone(), accrual.clone(), shutdown.clone()).run());

        // Three cycles one second apart; the third one credits.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(accrual.polled().len(), 3);
        assert_eq!(
            ledger.get_balance("alice").await.unwrap().current,
            Decimal::new(25, 0)
        );
    }
}
