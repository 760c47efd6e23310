//! Account identity records and the registration / edit payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use mockva_common::{parse_birth_date, AccountId, MockvaError, Money, Result};

use crate::balance::AccountBalance;

/// Maximum length of a display name.
pub const MAX_NAME_LEN: usize = 50;

/// A virtual account's identity. Balances live in [`AccountBalance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account identifier.
    #[serde(rename = "accountId")]
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Postal address.
    pub address: String,
    pub birth_date: NaiveDate,
    pub gender: bool,
}

impl Account {
    /// Apply the fields present in `edit`. The allow-negative flag is not an
    /// identity field and is handled by the balance path.
    pub fn apply_edit(&mut self, edit: &AccountEdit) -> Result<()> {
        if let Some(name) = &edit.name {
            validate_name(name)?;
            self.name = name.clone();
        }
        if let Some(address) = &edit.address {
            self.address = address.clone();
        }
        if let Some(gender) = edit.gender {
            self.gender = gender;
        }
        // An empty string leaves the birth date untouched.
        if let Some(birth_date) = edit.birth_date.as_deref().filter(|d| !d.is_empty()) {
            self.birth_date = parse_birth_date(birth_date)?;
        }
        Ok(())
    }
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRegistration {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// ISO `YYYY-MM-DD`.
    pub birth_date: String,
    #[serde(default)]
    pub gender: bool,
    #[serde(default)]
    pub allow_negative_balance: bool,
    /// Opening balance; zero when absent.
    #[serde(default)]
    pub initial_balance: Option<Money>,
}

impl AccountRegistration {
    pub fn validate(&self) -> Result<()> {
        if !self.id.is_valid() {
            return Err(MockvaError::invalid("account id must be 1-32 characters without spaces"));
        }
        validate_name(&self.name)?;
        parse_birth_date(&self.birth_date)?;
        if let Some(initial) = self.initial_balance {
            if initial.is_negative() {
                return Err(MockvaError::invalid("initial balance cannot be negative"));
            }
            if !initial.fits_scale() {
                return Err(MockvaError::invalid("initial balance must have at most 2 decimal places"));
            }
        }
        Ok(())
    }

    /// Validate and split into the identity record and its balance row.
    pub fn into_parts(self) -> Result<(Account, AccountBalance)> {
        self.validate()?;
        let birth_date = parse_birth_date(&self.birth_date)?;
        let balance = AccountBalance::new(
            self.id.clone(),
            self.initial_balance.unwrap_or_default(),
            self.allow_negative_balance,
        );
        let account = Account {
            id: self.id,
            name: self.name,
            address: self.address,
            birth_date,
            gender: self.gender,
        };
        Ok((account, balance))
    }
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_negative_balance: Option<bool>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MockvaError::invalid("name required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MockvaError::invalid("name must be at most 50 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> AccountRegistration {
        AccountRegistration {
            id: AccountId::new("1000000001"),
            name: "Alice".to_string(),
            address: "Jl. Sudirman 1".to_string(),
            birth_date: "1990-01-31".to_string(),
            gender: true,
            allow_negative_balance: false,
            initial_balance: Some(Money::from_major(100_000)),
        }
    }

    #[test]
    fn test_registration_into_parts() {
        let (account, balance) = registration().into_parts().unwrap();
        assert_eq!(account.id, AccountId::new("1000000001"));
        assert_eq!(account.birth_date, NaiveDate::from_ymd_opt(1990, 1, 31).unwrap());
        assert_eq!(balance.account_id, account.id);
        assert_eq!(balance.balance, Money::from_major(100_000));
        assert!(!balance.allow_negative_balance);
    }

    #[test]
    fn test_registration_rejects_bad_input() {
        let mut bad_date = registration();
        bad_date.birth_date = "31-01-1990".to_string();
        assert!(matches!(bad_date.validate(), Err(MockvaError::InvalidRequest(_))));

        let mut empty_id = registration();
        empty_id.id = AccountId::new("");
        assert!(empty_id.validate().is_err());

        let mut negative = registration();
        negative.initial_balance = Some(Money::from_major(-1));
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_apply_edit() {
        let (mut account, _) = registration().into_parts().unwrap();
        let edit = AccountEdit {
            name: Some("Alice B".to_string()),
            birth_date: Some(String::new()),
            gender: Some(false),
            ..Default::default()
        };
        account.apply_edit(&edit).unwrap();
        assert_eq!(account.name, "Alice B");
        assert!(!account.gender);
        assert_eq!(account.address, "Jl. Sudirman 1");
        assert_eq!(account.birth_date, NaiveDate::from_ymd_opt(1990, 1, 31).unwrap());
    }

    #[test]
    fn test_registration_deserializes_from_camel_case() {
        let json = r#"{"id":"ACC1","name":"Bob","birthDate":"2000-02-29","allowNegativeBalance":true}"#;
        let registration: AccountRegistration = serde_json::from_str(json).unwrap();
        assert!(registration.allow_negative_balance);
        assert!(registration.initial_balance.is_none());
        assert!(registration.validate().is_ok());
    }
}
