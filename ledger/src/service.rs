//! Account registration, lookup and edit.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use mockva_common::{AccountId, MockvaError, Money, Result};

use crate::account::{Account, AccountEdit, AccountRegistration};
use crate::balance::AccountBalance;
use crate::store::AccountRepository;

/// An account together with its committed balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    #[serde(flatten)]
    pub account: Account,
    pub balance: Money,
    pub allow_negative_balance: bool,
}

/// Identity operations over an [`AccountRepository`].
#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }

    /// Create the account and its balance row.
    #[instrument(skip(self, registration), fields(account_id = %registration.id))]
    pub async fn register(&self, registration: AccountRegistration) -> Result<Account> {
        let (account, balance) = registration.into_parts()?;
        self.repository.insert_account(&account, &balance).await?;

        info!(
            account_id = %account.id,
            balance = %balance.balance,
            allow_negative = balance.allow_negative_balance,
            "Account registered"
        );
        Ok(account)
    }

    pub async fn find_by_id(&self, account_id: &AccountId) -> Result<Account> {
        self.repository
            .find_account(account_id)
            .await?
            .ok_or_else(|| MockvaError::AccountNotFound(account_id.clone()))
    }

    pub async fn find_balance(&self, account_id: &AccountId) -> Result<AccountBalance> {
        self.repository
            .find_balance(account_id)
            .await?
            .ok_or_else(|| MockvaError::AccountNotFound(account_id.clone()))
    }

    pub async fn find_details(&self, account_id: &AccountId) -> Result<AccountDetails> {
        let account = self.find_by_id(account_id).await?;
        let balance = self.find_balance(account_id).await?;
        Ok(AccountDetails {
            account,
            balance: balance.balance,
            allow_negative_balance: balance.allow_negative_balance,
        })
    }

    /// Apply the present fields of `edit`.
    ///
    /// Identity fields are validated before anything is written. The
    /// identity change and the allow-negative flag commit together or not
    /// at all.
    #[instrument(skip(self, edit))]
    pub async fn edit(&self, account_id: &AccountId, edit: AccountEdit) -> Result<Account> {
        let mut account = self.find_by_id(account_id).await?;
        account.apply_edit(&edit)?;
        let account = self
            .repository
            .update_account(&account, edit.allow_negative_balance)
            .await?;

        info!(account_id = %account_id, "Account edited");
        Ok(account)
    }
}
