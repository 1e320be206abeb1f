//! Per-request deadlines for store calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::types::LedgerError;

/// Default bound for a single request-path store call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Run `future` with a deadline, mapping expiry to [`LedgerError::Timeout`]
///
/// Dropping the future on expiry cancels the store call; backends roll back
/// any transaction the dropped future had opened.
///
/// # Arguments
///
/// * `operation` - Name reported in the timeout error and log line
/// * `limit` - How long to wait
/// * `future` - The store call
pub async fn within<T, F>(operation: &str, limit: Duration, future: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(operation, millis, "store call timed out");
            Err(LedgerError::timeout(operation, millis))
        }
    }
}
