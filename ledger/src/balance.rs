//! Account balance tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mockva_common::{AccountId, MockvaError, Money, Result};

/// One balance row per account.
///
/// Mutated only by the transfer engine while the row is locked inside a
/// unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// Account identifier.
    pub account_id: AccountId,
    /// Current balance.
    pub balance: Money,
    /// When set, transfers may drive the balance below zero.
    pub allow_negative_balance: bool,
    /// When this balance was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Create a new balance row.
    pub fn new(account_id: AccountId, balance: Money, allow_negative_balance: bool) -> Self {
        Self {
            account_id,
            balance: balance.rescaled(),
            allow_negative_balance,
            updated_at: Utc::now(),
        }
    }

    /// True when debiting `amount` would break the sufficiency invariant.
    pub fn would_overdraw(&self, amount: Money) -> bool {
        if self.allow_negative_balance {
            return false;
        }
        match self.balance.checked_sub(amount) {
            Some(after) => after.is_negative(),
            None => true,
        }
    }

    /// Debit (decrease) the balance.
    pub fn debit(&mut self, amount: Money) -> Result<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| MockvaError::invalid("amount overflows balance"))?
            .rescaled();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Credit (increase) the balance.
    pub fn credit(&mut self, amount: Money) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| MockvaError::invalid("amount overflows balance"))?
            .rescaled();
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_operations() {
        let mut balance = AccountBalance::new(AccountId::new("A"), Money::from_major(100_000), false);

        assert!(!balance.would_overdraw(Money::from_major(100_000)));
        assert!(balance.would_overdraw(Money::new(dec!(100000.01))));

        balance.debit(Money::from_major(5_000)).unwrap();
        assert_eq!(balance.balance, Money::from_major(95_000));

        balance.credit(Money::new(dec!(0.25))).unwrap();
        assert_eq!(balance.balance, Money::new(dec!(95000.25)));
    }

    #[test]
    fn test_negative_balance_override() {
        let mut balance = AccountBalance::new(AccountId::new("A"), Money::from_major(100_000), true);
        assert!(!balance.would_overdraw(Money::from_major(150_000)));

        balance.debit(Money::from_major(150_000)).unwrap();
        assert_eq!(balance.balance, Money::from_major(-50_000));
    }
}
