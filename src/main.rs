//! Loyalty Ledger daemon
//!
//! Opens the ledger store and runs the accrual reconciliation worker until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- -r http://localhost:8081
//! ACCRUAL_SYSTEM_ADDRESS=http://accrual:8080 cargo run
//! cargo run --features postgres -- -r http://accrual:8080 -d postgres://user:pass@db/loyalty
//! RUST_LOG=loyalty_ledger=debug cargo run -- --poll-interval-ms 500
//! ```
//!
//! Without `-d`/`DATABASE_URI` the ledger lives in memory and is lost on
//! exit.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown after Ctrl-C
//! - 1: Startup error (bad database address, unreachable database, etc.)

use std::process;
use std::sync::Arc;

use anyhow::Context;
use loyalty_ledger::accrual::AccrualClient;
use loyalty_ledger::cli::{self, Config, LedgerBackend};
use loyalty_ledger::core::{InMemoryLedger, LedgerStore, ReconciliationWorker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = cli::parse_args();
    init_tracing(&config.log_level);

    if let Err(e) = run(config).await {
        error!(error = ?e, "loyalty ledger failed");
        process::exit(1);
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let accrual = AccrualClient::new(
        config.accrual_address.clone(),
        config.accrual_timeout(),
        config.retry_after_default(),
    )
    .context("failed to create accrual client")?;

    info!(accrual_address = %config.accrual_address, "starting reconciliation");

    let shutdown = CancellationToken::new();
    let worker = ReconciliationWorker::new(
        store,
        Arc::new(accrual),
        config.to_worker_config(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    shutdown.cancel();
    handle.await.context("reconciliation worker panicked")?;

    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    use loyalty_ledger::core::PgLedgerStore;

    match config.ledger_backend() {
        LedgerBackend::Postgres(uri) => {
            let store =
                PgLedgerStore::connect(uri, config.max_connections(), config.request_timeout())
                    .await
                    .context("failed to open postgres ledger")?;
            Ok(Arc::new(store))
        }
        LedgerBackend::InMemory => Ok(in_memory_store()),
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.ledger_backend() {
        LedgerBackend::Postgres(_) => anyhow::bail!(
            "a database address was given but this build lacks the 'postgres' feature"
        ),
        LedgerBackend::InMemory => Ok(in_memory_store()),
    }
}

/// Empty process-local ledger; nothing outside this process can upload orders to it
fn in_memory_store() -> Arc<dyn LedgerStore> {
    warn!(
        "no DATABASE_URI configured, using an empty in-memory ledger; \
         the worker has no orders to reconcile until an embedding caller uploads some"
    );
    Arc::new(InMemoryLedger::new())
}
