//! Ledger transfer engine.
//!
//! Moves funds between two balances: validates the request, locks both
//! balance rows in canonical order, enforces the sufficiency invariant and
//! persists the ledger entry plus both balances as one unit of work.
//! The engine keeps no per-call state; all coordination happens in storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use mockva_common::{constants, MockvaError, Result};

use crate::metrics::{MetricsSnapshot, TransferMetrics};
use crate::store::{run_in_transaction, AccountBalanceLocker, LedgerAppender, UnitOfWorkRunner};
use crate::transaction::{AccountTransaction, TransferRequest, ValidatedTransfer};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline applied when the caller supplies none. `None` waits forever.
    pub default_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(constants::default_transfer_timeout()),
        }
    }
}

/// Caller-supplied cancellation and deadline for one transfer.
#[derive(Debug, Clone)]
pub struct TransferContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TransferContext {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Cancel the transfer when `token` fires.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for TransferContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of the engine for outer layers.
#[async_trait]
pub trait Transfers: Send + Sync {
    async fn transfer(&self, request: TransferRequest, ctx: &TransferContext) -> Result<AccountTransaction>;

    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// The transfer engine, generic over its three storage capabilities.
pub struct TransferEngine<R, L, A> {
    runner: Arc<R>,
    balances: Arc<L>,
    ledger: Arc<A>,
    metrics: Arc<TransferMetrics>,
    config: EngineConfig,
}

impl<S> TransferEngine<S, S, S>
where
    S: UnitOfWorkRunner + AccountBalanceLocker<S::Work> + LedgerAppender<S::Work> + 'static,
{
    /// Engine whose three capabilities are all served by one store.
    pub fn from_store(store: Arc<S>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }
}

impl<R, L, A> TransferEngine<R, L, A>
where
    R: UnitOfWorkRunner + 'static,
    L: AccountBalanceLocker<R::Work> + 'static,
    A: LedgerAppender<R::Work> + 'static,
{
    /// Create a new transfer engine.
    pub fn new(runner: Arc<R>, balances: Arc<L>, ledger: Arc<A>) -> Self {
        Self {
            runner,
            balances,
            ledger,
            metrics: Arc::new(TransferMetrics::new()),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(&self) -> Arc<TransferMetrics> {
        self.metrics.clone()
    }

    /// Move `request.amount` from the source to the destination balance.
    ///
    /// Returns the persisted ledger entry, or the first error encountered.
    /// On any error nothing from this call is left in storage.
    #[instrument(
        skip(self, request, ctx),
        fields(
            src = %request.account_src_id,
            dst = %request.account_dst_id,
            amount = %request.amount
        )
    )]
    pub async fn transfer(
        &self,
        request: TransferRequest,
        ctx: &TransferContext,
    ) -> Result<AccountTransaction> {
        self.metrics.transfer_attempted();

        let result = self.execute(request, ctx).await;
        match &result {
            Ok(transaction) => {
                self.metrics.transfer_succeeded();
                info!(transaction_id = %transaction.id, "Transfer committed");
            }
            Err(e) if e.is_rejection() => {
                self.metrics.transfer_failed(e);
                warn!(error = %e, code = e.error_code(), "Transfer rejected");
            }
            Err(e) => {
                self.metrics.transfer_failed(e);
                error!(error = %e, code = e.error_code(), "Transfer failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        request: TransferRequest,
        ctx: &TransferContext,
    ) -> Result<AccountTransaction> {
        // Validation never touches storage.
        let transfer = request.validate()?;

        if ctx.token.is_cancelled() {
            return Err(MockvaError::Cancelled("transfer cancelled".to_string()));
        }
        let deadline = ctx
            .deadline
            .or_else(|| self.config.default_timeout.map(|t| Instant::now() + t));

        let balances = self.balances.clone();
        let ledger = self.ledger.clone();
        let token = ctx.token.clone();

        // Cancellation only races the work function; once it returns, the
        // commit or rollback runs to completion.
        run_in_transaction(self.runner.as_ref(), move |work| {
            Box::pin(async move {
                let apply = apply_transfer(balances.as_ref(), ledger.as_ref(), work, &transfer);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        Err(MockvaError::Cancelled("transfer cancelled".to_string()))
                    }
                    _ = sleep_until(deadline) => {
                        Err(MockvaError::Cancelled("transfer deadline exceeded".to_string()))
                    }
                    result = apply => result,
                }
            })
        })
        .await
    }
}

/// The body of the unit of work.
async fn apply_transfer<W, L, A>(
    balances: &L,
    ledger: &A,
    work: &mut W,
    transfer: &ValidatedTransfer,
) -> Result<AccountTransaction>
where
    W: Send,
    L: AccountBalanceLocker<W> + ?Sized,
    A: LedgerAppender<W> + ?Sized,
{
    // Lock the smaller id first so opposite-direction transfers between the
    // same pair cannot deadlock.
    let [first, second] = transfer.lock_order();
    let first_balance = match balances.find_and_lock_balance(work, first).await {
        Ok(balance) => balance,
        // A missing source is reported ahead of a missing destination.
        // Nothing is locked yet at this point.
        Err(MockvaError::AccountNotFound(missing)) if *first != transfer.source => {
            balances.find_and_lock_balance(work, &transfer.source).await?;
            return Err(MockvaError::AccountNotFound(missing));
        }
        Err(e) => return Err(e),
    };
    let second_balance = balances.find_and_lock_balance(work, second).await?;

    let (mut source, mut destination) = if *first == transfer.source {
        (first_balance, second_balance)
    } else {
        (second_balance, first_balance)
    };

    if source.would_overdraw(transfer.amount) {
        return Err(MockvaError::InsufficientFunds {
            account_id: source.account_id.clone(),
            amount: transfer.amount,
            balance: source.balance,
        });
    }

    let record = AccountTransaction::record(&source, &destination, transfer.amount);
    source.debit(transfer.amount)?;
    destination.credit(transfer.amount)?;

    ledger.append_transaction(work, &record).await?;
    balances.update_balance(work, &source).await?;
    balances.update_balance(work, &destination).await?;

    Ok(record)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl<R, L, A> Transfers for TransferEngine<R, L, A>
where
    R: UnitOfWorkRunner + 'static,
    L: AccountBalanceLocker<R::Work> + 'static,
    A: LedgerAppender<R::Work> + 'static,
{
    async fn transfer(
        &self,
        request: TransferRequest,
        ctx: &TransferContext,
    ) -> Result<AccountTransaction> {
        TransferEngine::transfer(self, request, ctx).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
