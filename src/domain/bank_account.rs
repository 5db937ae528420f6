use crate::domain::payment::ReceivingAccount;
use crate::error::{DeskError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Savings,
    Current,
    Business,
}

/// Admin-configured receiving account shown to payers.
///
/// At most one account has `is_default` set at any time; the stores enforce
/// this when they write.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub id: Uuid,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
    pub account_type: AccountType,
    pub is_active: bool,
    pub is_default: bool,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewBankAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub is_default: bool,
    pub admin_notes: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountUpdate {
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub bank_code: Option<String>,
    pub account_type: Option<AccountType>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub admin_notes: Option<String>,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(DeskError::ValidationError(format!(
            "{field} must be {min}-{max} characters"
        )))
    }
}

impl BankAccount {
    pub fn new(input: NewBankAccount, now: DateTime<Utc>) -> Result<Self> {
        let account = Self {
            id: Uuid::new_v4(),
            account_name: input.account_name,
            account_number: input.account_number,
            bank_name: input.bank_name,
            bank_code: input.bank_code,
            account_type: input.account_type,
            is_active: true,
            is_default: input.is_default,
            admin_notes: input.admin_notes,
            created_at: now,
            updated_at: now,
        };
        account.validate()?;
        Ok(account)
    }

    pub fn validate(&self) -> Result<()> {
        check_len("accountName", &self.account_name, 2, 100)?;
        check_len("accountNumber", &self.account_number, 5, 50)?;
        check_len("bankName", &self.bank_name, 2, 100)?;
        check_len("bankCode", &self.bank_code, 2, 20)
    }

    pub fn apply(&self, update: BankAccountUpdate, now: DateTime<Utc>) -> Result<Self> {
        let mut next = self.clone();
        if let Some(v) = update.account_name {
            next.account_name = v;
        }
        if let Some(v) = update.account_number {
            next.account_number = v;
        }
        if let Some(v) = update.bank_name {
            next.bank_name = v;
        }
        if let Some(v) = update.bank_code {
            next.bank_code = v;
        }
        if let Some(v) = update.account_type {
            next.account_type = v;
        }
        if let Some(v) = update.is_active {
            next.is_active = v;
        }
        if let Some(v) = update.is_default {
            next.is_default = v;
        }
        if update.admin_notes.is_some() {
            next.admin_notes = update.admin_notes;
        }
        next.updated_at = now;
        next.validate()?;
        Ok(next)
    }

    pub fn snapshot(&self) -> ReceivingAccount {
        ReceivingAccount {
            account_name: self.account_name.clone(),
            account_number: self.account_number.clone(),
            bank_name: self.bank_name.clone(),
            bank_code: self.bank_code.clone(),
        }
    }
}
