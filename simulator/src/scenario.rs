//! Load scenarios.
//!
//! A scenario turns the seeded accounts into a list of transfer requests.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;

use mockva_common::{AccountId, Money};
use mockva_ledger::TransferRequest;

/// Shape of the generated traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One hot source paying every other account.
    FanOut,
    /// Two accounts paying each other back and forth.
    Bidirectional,
    /// Uniformly random distinct pairs.
    Random,
}

impl Scenario {
    /// Generate `count` transfers between `accounts`, each moving between
    /// 0.01 and `max_amount`.
    pub fn plan(
        &self,
        accounts: &[AccountId],
        count: usize,
        max_amount: Money,
        rng: &mut StdRng,
    ) -> anyhow::Result<Vec<TransferRequest>> {
        if accounts.len() < 2 {
            anyhow::bail!("scenario {:?} needs at least 2 accounts", self);
        }
        let max_cents = i64::try_from((max_amount.value() * Decimal::ONE_HUNDRED).trunc())
            .unwrap_or(i64::MAX)
            .max(1);

        let mut transfers = Vec::with_capacity(count);
        for i in 0..count {
            let (src, dst) = match self {
                Scenario::FanOut => (0, 1 + i % (accounts.len() - 1)),
                Scenario::Bidirectional => {
                    if i % 2 == 0 {
                        (0, 1)
                    } else {
                        (1, 0)
                    }
                }
                Scenario::Random => {
                    let src = rng.gen_range(0..accounts.len());
                    let mut dst = rng.gen_range(0..accounts.len() - 1);
                    if dst >= src {
                        dst += 1;
                    }
                    (src, dst)
                }
            };
            let amount = Money::new(Decimal::new(rng.gen_range(1..=max_cents), 2));
            transfers.push(TransferRequest::new(
                accounts[src].clone(),
                accounts[dst].clone(),
                amount,
            ));
        }
        Ok(transfers)
    }
}
