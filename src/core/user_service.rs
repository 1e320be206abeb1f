//! Login registration

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::deadline::{within, DEFAULT_REQUEST_TIMEOUT};
use super::traits::LedgerStore;
use crate::types::LedgerError;

/// Registers logins and opens their balances
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn LedgerStore>,
    request_timeout: Duration,
}

impl UserService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_timeout(store, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<dyn LedgerStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }

    /// Register `login` with a zeroed balance
    ///
    /// Fails with `UserAlreadyExists` if the login is taken; the existing
    /// balance is left untouched.
    pub async fn register(&self, login: &str) -> Result<(), LedgerError> {
        within(
            "register_user",
            self.request_timeout,
            self.store.register_user(login),
        )
        .await?;
        info!(login, "login registered");
        Ok(())
    }
}
