//! PostgreSQL storage adapter.
//!
//! A unit of work wraps one `sqlx` transaction. Balance locks are
//! `SELECT ... FOR UPDATE` row locks, released by commit or rollback.
//! Dropping an uncommitted [`PgWork`] rolls the transaction back.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, error, instrument};

use mockva_common::{AccountId, MockvaError, Money, Result};

use crate::account::Account;
use crate::balance::AccountBalance;
use crate::store::{AccountBalanceLocker, AccountRepository, LedgerAppender, UnitOfWorkRunner};
use crate::transaction::AccountTransaction;

const UNIQUE_VIOLATION: &str = "23505";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// A unit of work against [`PgStore`].
pub struct PgWork {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<AccountId>,
}

/// Storage backend over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    /// Bound on a single row-lock wait, enforced by the server.
    lock_timeout: Option<Duration>,
}

#[derive(sqlx::FromRow)]
struct BalanceRow {
    account_id: String,
    balance: Decimal,
    allow_negative_balance: bool,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for AccountBalance {
    fn from(row: BalanceRow) -> Self {
        Self {
            account_id: AccountId::new(row.account_id),
            balance: Money::new(row.balance),
            allow_negative_balance: row.allow_negative_balance,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    name: String,
    address: String,
    birth_date: NaiveDate,
    gender: bool,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: AccountId::new(row.id),
            name: row.name,
            address: row.address,
            birth_date: row.birth_date,
            gender: row.gender,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_db_error)?;
        Ok(Self::new(pool))
    }

    /// Have the server abort a row-lock wait after `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MockvaError::storage(format!("migration failed: {e}")))
    }
}

fn map_db_error(e: sqlx::Error) -> MockvaError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some(DEADLOCK_DETECTED) => return MockvaError::storage("deadlock detected"),
            Some(LOCK_NOT_AVAILABLE) => return MockvaError::storage("row lock wait timed out"),
            _ => {}
        }
    }
    error!(error = %e, "Database error");
    MockvaError::storage(e)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

#[async_trait]
impl UnitOfWorkRunner for PgStore {
    type Work = PgWork;

    async fn begin(&self) -> Result<PgWork> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        if let Some(timeout) = self.lock_timeout {
            // SET does not accept bind parameters.
            let statement = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis());
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }
        Ok(PgWork {
            tx,
            locked: HashSet::new(),
        })
    }

    async fn commit(&self, work: PgWork) -> Result<()> {
        work.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(&self, work: PgWork) -> Result<()> {
        work.tx.rollback().await.map_err(map_db_error)
    }
}

#[async_trait]
impl AccountBalanceLocker<PgWork> for PgStore {
    #[instrument(skip(self, work))]
    async fn find_and_lock_balance(
        &self,
        work: &mut PgWork,
        account_id: &AccountId,
    ) -> Result<AccountBalance> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT account_id, balance, allow_negative_balance, updated_at
            FROM account_balances
            WHERE account_id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id.as_str())
        .fetch_optional(&mut *work.tx)
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => {
                work.locked.insert(account_id.clone());
                debug!(account_id = %account_id, "Balance row locked");
                Ok(row.into())
            }
            None => Err(MockvaError::AccountNotFound(account_id.clone())),
        }
    }

    async fn update_balance(
        &self,
        work: &mut PgWork,
        balance: &AccountBalance,
    ) -> Result<AccountBalance> {
        if !work.locked.contains(&balance.account_id) {
            return Err(MockvaError::storage(format!(
                "balance {} updated without holding its row lock",
                balance.account_id
            )));
        }

        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            UPDATE account_balances
            SET balance = $1, allow_negative_balance = $2, updated_at = now()
            WHERE account_id = $3
            RETURNING account_id, balance, allow_negative_balance, updated_at
            "#,
        )
        .bind(balance.balance.rescaled().value())
        .bind(balance.allow_negative_balance)
        .bind(balance.account_id.as_str())
        .fetch_optional(&mut *work.tx)
        .await
        .map_err(map_db_error)?;

        row.map(AccountBalance::from)
            .ok_or_else(|| MockvaError::AccountNotFound(balance.account_id.clone()))
    }
}

#[async_trait]
impl LedgerAppender<PgWork> for PgStore {
    async fn append_transaction(
        &self,
        work: &mut PgWork,
        transaction: &AccountTransaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_transactions
                (id, transaction_timestamp, amount, account_src_id, account_dst_id,
                 src_balance_before, dst_balance_before)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*transaction.id.as_uuid())
        .bind(transaction.transaction_timestamp)
        .bind(transaction.amount.value())
        .bind(transaction.account_src_id.as_str())
        .bind(transaction.account_dst_id.as_str())
        .bind(transaction.src_balance_before.value())
        .bind(transaction.dst_balance_before.value())
        .execute(&mut *work.tx)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    #[instrument(skip(self, account, balance), fields(account_id = %account.id))]
    async fn insert_account(&self, account: &Account, balance: &AccountBalance) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let inserted = sqlx::query(
            "INSERT INTO accounts (id, name, address, birth_date, gender) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(account.id.as_str())
        .bind(&account.name)
        .bind(&account.address)
        .bind(account.birth_date)
        .bind(account.gender)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(MockvaError::AccountAlreadyExists(account.id.clone()));
            }
            return Err(map_db_error(e));
        }

        sqlx::query(
            "INSERT INTO account_balances (account_id, balance, allow_negative_balance) VALUES ($1, $2, $3)",
        )
        .bind(balance.account_id.as_str())
        .bind(balance.balance.rescaled().value())
        .bind(balance.allow_negative_balance)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)
    }

    async fn find_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, address, birth_date, gender FROM accounts WHERE id = $1",
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Account::from))
    }

    async fn update_account(
        &self,
        account: &Account,
        allow_negative_balance: Option<bool>,
    ) -> Result<Account> {
        let mut work = self.begin().await?;

        let result = sqlx::query(
            "UPDATE accounts SET name = $2, address = $3, birth_date = $4, gender = $5 WHERE id = $1",
        )
        .bind(account.id.as_str())
        .bind(&account.name)
        .bind(&account.address)
        .bind(account.birth_date)
        .bind(account.gender)
        .execute(&mut *work.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(MockvaError::AccountNotFound(account.id.clone()));
        }

        if let Some(allow) = allow_negative_balance {
            let mut balance = self.find_and_lock_balance(&mut work, &account.id).await?;
            balance.allow_negative_balance = allow;
            self.update_balance(&mut work, &balance).await?;
        }

        self.commit(work).await?;
        Ok(account.clone())
    }

    async fn find_balance(&self, account_id: &AccountId) -> Result<Option<AccountBalance>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT account_id, balance, allow_negative_balance, updated_at
            FROM account_balances
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(AccountBalance::from))
    }}
