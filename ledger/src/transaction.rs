//! Ledger entries and the transfer request that produces them.

use serde::{Deserialize, Serialize};

use mockva_common::{now, AccountId, MockvaError, Money, Result, Timestamp, TransactionId};

use crate::balance::AccountBalance;

/// An immutable record of one completed transfer.
///
/// The two `*_balance_before` fields are the balances as observed under lock,
/// before the transfer mutated them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransaction {
    /// Unique entry ID.
    pub id: TransactionId,
    pub transaction_timestamp: Timestamp,
    /// Amount moved, always positive.
    pub amount: Money,
    pub account_src_id: AccountId,
    pub account_dst_id: AccountId,
    pub src_balance_before: Money,
    pub dst_balance_before: Money,
}

impl AccountTransaction {
    /// Build the entry from the two locked balances, before mutating them.
    pub fn record(source: &AccountBalance, destination: &AccountBalance, amount: Money) -> Self {
        Self {
            id: TransactionId::new(),
            transaction_timestamp: now(),
            amount: amount.rescaled(),
            account_src_id: source.account_id.clone(),
            account_dst_id: destination.account_id.clone(),
            src_balance_before: source.balance,
            dst_balance_before: destination.balance,
        }
    }
}

/// Transfer request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default = "empty_account_id")]
    pub account_src_id: AccountId,
    #[serde(default = "empty_account_id")]
    pub account_dst_id: AccountId,
    #[serde(default)]
    pub amount: Money,
}

fn empty_account_id() -> AccountId {
    AccountId::new("")
}

impl TransferRequest {
    pub fn new(
        account_src_id: impl Into<AccountId>,
        account_dst_id: impl Into<AccountId>,
        amount: Money,
    ) -> Self {
        Self {
            account_src_id: account_src_id.into(),
            account_dst_id: account_dst_id.into(),
            amount,
        }
    }

    /// Fail-fast validation; the first failing check wins.
    pub fn validate(&self) -> Result<ValidatedTransfer> {
        if self.account_src_id.is_empty() {
            return Err(MockvaError::invalid("source account id required"));
        }
        if self.account_dst_id.is_empty() {
            return Err(MockvaError::invalid("destination account id required"));
        }
        if !self.amount.is_positive() {
            return Err(MockvaError::invalid("amount must be positive"));
        }
        if self.account_src_id == self.account_dst_id {
            return Err(MockvaError::invalid("cannot transfer to the same account"));
        }
        if !self.amount.fits_scale() {
            return Err(MockvaError::invalid("amount must have at most 2 decimal places"));
        }

        Ok(ValidatedTransfer {
            source: self.account_src_id.clone(),
            destination: self.account_dst_id.clone(),
            amount: self.amount.rescaled(),
        })
    }
}

/// A transfer that passed validation: distinct, non-empty ids and a
/// positive amount at currency scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Money,
}

impl ValidatedTransfer {
    /// The two ids in canonical lock order (ascending), independent of the
    /// transfer direction.
    pub fn lock_order(&self) -> [&AccountId; 2] {
        if self.source <= self.destination {
            [&self.source, &self.destination]
        } else {
            [&self.destination, &self.source]
        }
    }
}
