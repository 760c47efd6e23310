//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

use mockva_common::{AccountId, Money};
use mockva_ledger::{
    AccountBalanceLocker, AccountRegistration, AccountRepository, AccountService, EngineConfig,
    LedgerAppender, MetricsSnapshot, TransferContext, TransferEngine, Transfers,
    UnitOfWorkRunner,
};

use crate::metrics::SimulationMetrics;
use crate::scenario::Scenario;

/// Every n-th seeded account may go negative.
const ALLOW_NEGATIVE_EVERY: usize = 5;

/// Outcome of the post-run ledger checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub total_before: Decimal,
    pub total_after: Decimal,
    /// Accounts that went negative without being allowed to.
    pub overdrawn: Vec<AccountId>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.total_before == self.total_after && self.overdrawn.is_empty()
    }
}

/// Controls the simulation.
pub struct SimulationController {
    transfers: Arc<dyn Transfers>,
    accounts: AccountService,
    /// Random number generator.
    rng: StdRng,
    /// Seeded account ids.
    seeded: Vec<AccountId>,
}

impl SimulationController {
    /// Create a controller over a store serving every storage capability.
    pub fn over_store<S>(store: Arc<S>, config: EngineConfig, seed: Option<u64>) -> Self
    where
        S: UnitOfWorkRunner
            + AccountBalanceLocker<S::Work>
            + LedgerAppender<S::Work>
            + AccountRepository
            + 'static,
    {
        let engine = TransferEngine::from_store(store.clone()).with_config(config);
        Self::new(Arc::new(engine), AccountService::new(store), seed)
    }

    pub fn new(transfers: Arc<dyn Transfers>, accounts: AccountService, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            transfers,
            accounts,
            rng,
            seeded: Vec::new(),
        }
    }

    pub fn accounts(&self) -> &[AccountId] {
        &self.seeded
    }

    /// Register `count` fresh accounts holding `initial_balance` each.
    pub async fn seed_accounts(&mut self, count: usize, initial_balance: Money) -> anyhow::Result<()> {
        // Unique per run so repeated runs against one database do not collide.
        let run: u32 = self.rng.gen();
        info!(count, run = %format!("{run:08x}"), "Seeding accounts");

        for i in 0..count {
            let id = AccountId::new(format!("SIM{run:08x}{i:06}"));
            self.accounts
                .register(AccountRegistration {
                    id: id.clone(),
                    name: format!("Simulated {i}"),
                    address: String::new(),
                    birth_date: "1990-01-01".to_string(),
                    gender: i % 2 == 0,
                    allow_negative_balance: i % ALLOW_NEGATIVE_EVERY == ALLOW_NEGATIVE_EVERY - 1,
                    initial_balance: Some(initial_balance),
                })
                .await?;
            self.seeded.push(id);
        }
        Ok(())
    }

    /// Sum of the seeded accounts' committed balances.
    pub async fn total_balance(&self) -> anyhow::Result<Decimal> {
        let mut total = Decimal::ZERO;
        for id in &self.seeded {
            total += self.accounts.find_balance(id).await?.balance.value();
        }
        Ok(total)
    }

    /// Run the scenario with at most `concurrency` transfers in flight.
    pub async fn run(
        &mut self,
        scenario: Scenario,
        count: usize,
        max_amount: Money,
        concurrency: usize,
    ) -> anyhow::Result<(SimulationMetrics, Duration)> {
        let plan = scenario.plan(&self.seeded, count, max_amount, &mut self.rng)?;
        info!(?scenario, transfers = plan.len(), concurrency, "Running scenario");

        let started = Instant::now();
        let mut results = stream::iter(plan)
            .map(|request| {
                let transfers = self.transfers.clone();
                tokio::spawn(async move {
                    let begun = Instant::now();
                    let result = transfers.transfer(request, &TransferContext::new()).await;
                    (result, begun.elapsed())
                })
            })
            .buffer_unordered(concurrency.max(1));

        let mut metrics = SimulationMetrics::new();
        while let Some(joined) = results.next().await {
            let (result, latency) = joined?;
            match result {
                Ok(_) => metrics.record_success(latency),
                Err(e) => {
                    if !e.is_rejection() {
                        warn!(error = %e, "Transfer failed");
                    }
                    metrics.record_error(&e);
                }
            }
        }

        Ok((metrics, started.elapsed()))
    }

    /// Check conservation and the sufficiency invariant across the seeded
    /// accounts.
    pub async fn verify(&self, total_before: Decimal) -> anyhow::Result<Verification> {
        let mut total_after = Decimal::ZERO;
        let mut overdrawn = Vec::new();
        for id in &self.seeded {
            let balance = self.accounts.find_balance(id).await?;
            total_after += balance.balance.value();
            if balance.balance.is_negative() && !balance.allow_negative_balance {
                overdrawn.push(id.clone());
            }
        }

        Ok(Verification {
            total_before,
            total_after,
            overdrawn,
        })
    }

    pub fn engine_metrics(&self) -> MetricsSnapshot {
        self.transfers.metrics_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockva_ledger::InMemoryStore;

    async fn run_scenario(scenario: Scenario) -> (SimulationController, SimulationMetrics, Decimal) {
        let mut controller = SimulationController::over_store(
            Arc::new(InMemoryStore::new()),
            EngineConfig::default(),
            Some(11),
        );
        controller.seed_accounts(6, Money::from_major(100)).await.unwrap();
        let before = controller.total_balance().await.unwrap();

        let (metrics, _) = controller
            .run(scenario, 300, Money::from_major(40), 8)
            .await
            .unwrap();
        (controller, metrics, before)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_scenario_conserves_funds() {
        let (controller, metrics, before) = run_scenario(Scenario::Random).await;

        assert_eq!(metrics.total_transfers, 300);
        assert_eq!(metrics.failed, 0);
        let verification = controller.verify(before).await.unwrap();
        assert!(verification.passed(), "{verification:?}");
        assert_eq!(verification.total_after, Decimal::from(600));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_rejects_once_drained() {
        let (controller, metrics, before) = run_scenario(Scenario::FanOut).await;

        // The hot source cannot go negative, so most transfers bounce.
        assert!(metrics.rejected > 0);
        assert_eq!(metrics.committed + metrics.rejected, 300);
        assert!(controller.verify(before).await.unwrap().passed());
        assert_eq!(controller.engine_metrics().succeeded, metrics.committed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bidirectional_finishes() {
        let (controller, metrics, before) = tokio::time::timeout(
            Duration::from_secs(10),
            run_scenario(Scenario::Bidirectional),
        )
        .await
        .expect("no deadlock");

        assert_eq!(metrics.failed, 0);
        assert!(controller.verify(before).await.unwrap().passed());
    }
}
