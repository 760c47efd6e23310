//! Storage capabilities consumed by the ledger.
//!
//! A storage backend provides:
//! - a [`UnitOfWorkRunner`] that opens, commits and rolls back units of work
//! - an [`AccountBalanceLocker`] for pessimistic balance reads and writes
//! - a [`LedgerAppender`] for immutable ledger entries
//! - an [`AccountRepository`] for identity CRUD
//!
//! The unit of work handle (`Work`) is created by the runner and passed
//! explicitly to every call made inside it; it is never stored anywhere else.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use mockva_common::{AccountId, MockvaError, Result};

use crate::account::Account;
use crate::balance::AccountBalance;
use crate::transaction::AccountTransaction;

/// Opens and finishes all-or-nothing units of work.
#[async_trait]
pub trait UnitOfWorkRunner: Send + Sync {
    /// Scoped transactional context. Dropping it without commit rolls back.
    type Work: Send + 'static;

    async fn begin(&self) -> Result<Self::Work>;

    async fn commit(&self, work: Self::Work) -> Result<()>;

    async fn rollback(&self, work: Self::Work) -> Result<()>;
}

/// Locked balance access inside a unit of work.
#[async_trait]
pub trait AccountBalanceLocker<W: Send>: Send + Sync {
    /// Read the balance and hold a row-level write lock on it until `work`
    /// ends. Blocks while another unit of work holds the lock.
    async fn find_and_lock_balance(&self, work: &mut W, account_id: &AccountId) -> Result<AccountBalance>;

    /// Write a balance previously locked through `work`. Visible to others
    /// only after commit.
    async fn update_balance(&self, work: &mut W, balance: &AccountBalance) -> Result<AccountBalance>;
}

/// Append-only ledger entry storage.
#[async_trait]
pub trait LedgerAppender<W: Send>: Send + Sync {
    async fn append_transaction(&self, work: &mut W, transaction: &AccountTransaction) -> Result<()>;
}

/// Account identity storage. Every call is its own unit of work.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create the account together with its balance row.
    async fn insert_account(&self, account: &Account, balance: &AccountBalance) -> Result<()>;

    async fn find_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Write the identity fields and, when given, the allow-negative flag as
    /// one unit of work. The flag is changed under the balance row lock.
    async fn update_account(&self, account: &Account, allow_negative_balance: Option<bool>) -> Result<Account>;

    /// Unlocked, committed view of a balance.
    async fn find_balance(&self, account_id: &AccountId) -> Result<Option<AccountBalance>>;
}

/// Run `work_fn` inside a unit of work: commit when it returns `Ok`, roll
/// back when it returns `Err`.
///
/// The work error is returned unchanged. A failed rollback is logged and does
/// not replace it; a failed commit surfaces as a storage error.
pub async fn run_in_transaction<R, T, F>(runner: &R, work_fn: F) -> Result<T>
where
    R: UnitOfWorkRunner + ?Sized,
    T: Send,
    F: for<'w> FnOnce(&'w mut R::Work) -> BoxFuture<'w, Result<T>> + Send,
{
    let mut work = runner.begin().await?;

    match work_fn(&mut work).await {
        Ok(value) => {
            runner.commit(work).await.map_err(|e| match e {
                MockvaError::StorageError(_) => e,
                other => MockvaError::storage(other),
            })?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = runner.rollback(work).await {
                warn!(
                    error = %e,
                    rollback_error = %rollback_error,
                    "Rollback failed after unit of work error"
                );
            }
            Err(e)
        }
    }
}
