//! In-memory storage adapter.
//!
//! Row locks are per-account async mutexes; a unit of work keeps the owned
//! guards until it commits or rolls back, so a second unit of work touching
//! the same row waits exactly like it would on `SELECT ... FOR UPDATE`.
//! Writes are staged in the unit of work and only become visible on commit.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::{debug, instrument};

use mockva_common::{AccountId, MockvaError, Money, Result};

use crate::account::Account;
use crate::balance::AccountBalance;
use crate::store::{AccountBalanceLocker, AccountRepository, LedgerAppender, UnitOfWorkRunner};
use crate::transaction::AccountTransaction;

/// Points at which a storage failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    LockBalance,
    UpdateBalance,
    AppendTransaction,
    Commit,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    balances: HashMap<AccountId, AccountBalance>,
    transactions: Vec<AccountTransaction>,
}

/// A unit of work against [`InMemoryStore`].
pub struct MemoryWork {
    id: u64,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged_accounts: HashMap<AccountId, Account>,
    staged_balances: HashMap<AccountId, AccountBalance>,
    staged_transactions: Vec<AccountTransaction>,
}

impl MemoryWork {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this unit of work holds the row lock for `account_id`.
    pub fn holds_lock(&self, account_id: &AccountId) -> bool {
        self.held.contains_key(account_id)
    }
}

/// Storage backend that keeps everything in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<LedgerState>,
    row_locks: DashMap<AccountId, Arc<RowLock<()>>>,
    faults: Mutex<HashSet<FaultPoint>>,
    storage_calls: AtomicU64,
    next_work_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call at `point` fail with a storage error.
    pub fn fail_at(&self, point: FaultPoint) {
        self.faults.lock().insert(point);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of storage operations issued so far.
    pub fn storage_calls(&self) -> u64 {
        self.storage_calls.load(Ordering::Relaxed)
    }

    /// Committed balance of an account.
    pub fn balance_of(&self, account_id: &AccountId) -> Option<Money> {
        self.state.read().balances.get(account_id).map(|b| b.balance)
    }

    /// Snapshot of all committed balances.
    pub fn balances(&self) -> Vec<AccountBalance> {
        self.state.read().balances.values().cloned().collect()
    }

    /// Snapshot of the committed ledger.
    pub fn transactions(&self) -> Vec<AccountTransaction> {
        self.state.read().transactions.clone()
    }

    fn record_call(&self) {
        self.storage_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn check_fault(&self, point: FaultPoint) -> Result<()> {
        if self.faults.lock().contains(&point) {
            return Err(MockvaError::storage(format!("injected {point:?} failure")));
        }
        Ok(())
    }

    async fn lock_row(&self, work: &mut MemoryWork, account_id: &AccountId) {
        if work.held.contains_key(account_id) {
            return;
        }
        let row = self
            .row_locks
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone();
        let guard = row.lock_owned().await;
        work.held.insert(account_id.clone(), guard);
    }
}

#[async_trait]
impl UnitOfWorkRunner for InMemoryStore {
    type Work = MemoryWork;

    async fn begin(&self) -> Result<MemoryWork> {
        self.record_call();
        self.check_fault(FaultPoint::Begin)?;
        Ok(MemoryWork {
            id: self.next_work_id.fetch_add(1, Ordering::Relaxed),
            held: HashMap::new(),
            staged_accounts: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_transactions: Vec::new(),
        })
    }

    async fn commit(&self, mut work: MemoryWork) -> Result<()> {
        self.record_call();
        // On failure `work` is dropped here, which discards staged writes
        // and releases its row locks.
        self.check_fault(FaultPoint::Commit)?;

        {
            let mut state = self.state.write();
            for (account_id, account) in work.staged_accounts.drain() {
                state.accounts.insert(account_id, account);
            }
            for (account_id, balance) in work.staged_balances.drain() {
                state.balances.insert(account_id, balance);
            }
            state.transactions.append(&mut work.staged_transactions);
        }

        debug!(work_id = work.id, locks = work.held.len(), "Unit of work committed");
        Ok(())
    }

    async fn rollback(&self, work: MemoryWork) -> Result<()> {
        self.record_call();
        debug!(
            work_id = work.id,
            discarded_balances = work.staged_balances.len(),
            discarded_transactions = work.staged_transactions.len(),
            "Unit of work rolled back"
        );
        Ok(())
    }
}

#[async_trait]
impl AccountBalanceLocker<MemoryWork> for InMemoryStore {
    async fn find_and_lock_balance(
        &self,
        work: &mut MemoryWork,
        account_id: &AccountId,
    ) -> Result<AccountBalance> {
        self.record_call();
        self.check_fault(FaultPoint::LockBalance)?;

        let exists = self.state.read().balances.contains_key(account_id);
        if !exists {
            return Err(MockvaError::AccountNotFound(account_id.clone()));
        }

        self.lock_row(work, account_id).await;

        if let Some(staged) = work.staged_balances.get(account_id) {
            return Ok(staged.clone());
        }
        let committed = self.state.read().balances.get(account_id).cloned();
        committed.ok_or_else(|| MockvaError::AccountNotFound(account_id.clone()))
    }

    async fn update_balance(
        &self,
        work: &mut MemoryWork,
        balance: &AccountBalance,
    ) -> Result<AccountBalance> {
        self.record_call();
        self.check_fault(FaultPoint::UpdateBalance)?;

        if !work.holds_lock(&balance.account_id) {
            return Err(MockvaError::storage(format!(
                "balance {} updated without holding its row lock",
                balance.account_id
            )));
        }

        let mut updated = balance.clone();
        updated.updated_at = Utc::now();
        work.staged_balances
            .insert(updated.account_id.clone(), updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl LedgerAppender<MemoryWork> for InMemoryStore {
    async fn append_transaction(
        &self,
        work: &mut MemoryWork,
        transaction: &AccountTransaction,
    ) -> Result<()> {
        self.record_call();
        self.check_fault(FaultPoint::AppendTransaction)?;

        let duplicate = work.staged_transactions.iter().any(|t| t.id == transaction.id)
            || self
                .state
                .read()
                .transactions
                .iter()
                .any(|t| t.id == transaction.id);
        if duplicate {
            return Err(MockvaError::storage(format!(
                "duplicate transaction id {}",
                transaction.id
            )));
        }

        work.staged_transactions.push(transaction.clone());
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    #[instrument(skip(self, account, balance), fields(account_id = %account.id))]
    async fn insert_account(&self, account: &Account, balance: &AccountBalance) -> Result<()> {
        self.record_call();
        let mut state = self.state.write();
        if state.accounts.contains_key(&account.id) {
            return Err(MockvaError::AccountAlreadyExists(account.id.clone()));
        }
        state.accounts.insert(account.id.clone(), account.clone());
        state.balances.insert(account.id.clone(), balance.clone());
        Ok(())
    }

    async fn find_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.record_call();
        Ok(self.state.read().accounts.get(account_id).cloned())
    }

    async fn update_account(
        &self,
        account: &Account,
        allow_negative_balance: Option<bool>,
    ) -> Result<Account> {
        let mut work = self.begin().await?;

        let exists = self.state.read().accounts.contains_key(&account.id);
        if !exists {
            return Err(MockvaError::AccountNotFound(account.id.clone()));
        }
        work.staged_accounts.insert(account.id.clone(), account.clone());

        if let Some(allow) = allow_negative_balance {
            let mut balance = self.find_and_lock_balance(&mut work, &account.id).await?;
            balance.allow_negative_balance = allow;
            self.update_balance(&mut work, &balance).await?;
        }

        self.commit(work).await?;
        Ok(account.clone())
    }

    async fn find_balance(&self, account_id: &AccountId) -> Result<Option<AccountBalance>> {
        self.record_call();
        Ok(self.state.read().balances.get(account_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        {
            let mut state = store.state.write();
            for (id, amount) in [("A", 100), ("B", 0)] {
                let id = AccountId::new(id);
                state.balances.insert(
                    id.clone(),
                    AccountBalance::new(id, Money::from_major(amount), false),
                );
            }
        }
        store
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = seeded_store();
        let a = AccountId::new("A");

        let mut work = store.begin().await.unwrap();
        let mut balance = store.find_and_lock_balance(&mut work, &a).await.unwrap();
        balance.debit(Money::from_major(40)).unwrap();
        store.update_balance(&mut work, &balance).await.unwrap();

        assert_eq!(store.balance_of(&a), Some(Money::from_major(100)));
        store.commit(work).await.unwrap();
        assert_eq!(store.balance_of(&a), Some(Money::from_major(60)));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = seeded_store();
        let a = AccountId::new("A");

        let mut work = store.begin().await.unwrap();
        let mut balance = store.find_and_lock_balance(&mut work, &a).await.unwrap();
        balance.credit(Money::from_major(1)).unwrap();
        store.update_balance(&mut work, &balance).await.unwrap();
        store.rollback(work).await.unwrap();

        assert_eq!(store.balance_of(&a), Some(Money::from_major(100)));
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_unit_of_work() {
        let store = Arc::new(seeded_store());
        let a = AccountId::new("A");

        let mut first = store.begin().await.unwrap();
        store.find_and_lock_balance(&mut first, &a).await.unwrap();

        let contender = {
            let store = store.clone();
            let a = a.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                store.find_and_lock_balance(&mut second, &a).await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        store.rollback(first).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released on rollback")
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_requires_lock() {
        let store = seeded_store();
        let mut work = store.begin().await.unwrap();
        let balance = AccountBalance::new(AccountId::new("A"), Money::from_major(5), false);
        let err = store.update_balance(&mut work, &balance).await.unwrap_err();
        assert!(matches!(err, MockvaError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let store = seeded_store();
        let mut work = store.begin().await.unwrap();
        let err = store
            .find_and_lock_balance(&mut work, &AccountId::new("ZZZ"))
            .await
            .unwrap_err();
        assert_eq!(err, MockvaError::AccountNotFound(AccountId::new("ZZZ")));
        assert!(!work.holds_lock(&AccountId::new("ZZZ")));
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let store = seeded_store();
        store.fail_at(FaultPoint::Begin);
        assert!(store.begin().await.is_err());
        store.clear_faults();
        assert!(store.begin().await.is_ok());
    }
}
