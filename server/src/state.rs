//! Shared handler state.

use std::sync::Arc;
use std::time::Duration;

use mockva_ledger::{AccountService, Transfers};

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub transfers: Arc<dyn Transfers>,
    pub accounts: AccountService,
    /// Deadline given to each transfer request.
    pub transfer_timeout: Duration,
}

impl AppState {
    pub fn new(transfers: Arc<dyn Transfers>, accounts: AccountService, transfer_timeout: Duration) -> Self {
        Self {
            transfers,
            accounts,
            transfer_timeout,
        }
    }
}
