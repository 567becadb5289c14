//! Account-related types
//!
//! This module defines the Account structure and the single place where a
//! balance movement is posted to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::ids::AccountId;
use super::transaction::{LedgerPosition, TransactionType};

/// Authority level of an account holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Admin,
}

/// Details needed to open an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub id: AccountId,
    pub email: String,
    pub display_name: String,

    /// Starting balance; the engine's configured opening balance when `None`
    pub opening_balance: Option<u64>,
}

impl NewAccount {
    pub fn new(id: impl Into<AccountId>, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            opening_balance: None,
        }
    }

    pub fn with_opening_balance(mut self, balance: u64) -> Self {
        self.opening_balance = Some(balance);
        self
    }
}

/// Point balance held by one user
///
/// The balance is unsigned, so `balance >= 0` holds by construction; every
/// change goes through [`Account::post`], which also advances the ledger
/// sequence that orders the account's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub display_name: String,

    /// Current balance in points
    pub balance: u64,

    /// Balance the account was opened with; ledger replay starts here
    pub opening_balance: u64,

    /// Number of ledger records posted against this account
    pub ledger_sequence: u64,

    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a customer account holding `opening_balance` points
    pub fn open(new: NewAccount, opening_balance: u64, now: DateTime<Utc>) -> Self {
        Account {
            id: new.id,
            email: new.email,
            display_name: new.display_name,
            balance: opening_balance,
            opening_balance,
            ledger_sequence: 0,
            role: Role::Customer,
            created_at: now,
            updated_at: now,
        }
    }

    /// Post a balance movement
    ///
    /// On success the balance, sequence and `updated_at` are advanced together
    /// and the new ledger position is returned. On failure the account is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// * `InsufficientFunds` - a debit larger than the balance
    /// * `ArithmeticOverflow` - a credit that would overflow
    pub fn post(
        &mut self,
        tx_type: TransactionType,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<LedgerPosition, LedgerError> {
        let balance_after = match tx_type.apply(self.balance, amount) {
            Some(balance) => balance,
            None if tx_type.is_credit() => {
                return Err(LedgerError::arithmetic_overflow(tx_type.label()))
            }
            None => {
                return Err(LedgerError::insufficient_funds(
                    self.id.clone(),
                    self.balance,
                    amount,
                ))
            }
        };
        let sequence = self
            .ledger_sequence
            .checked_add(1)
            .ok_or_else(|| LedgerError::arithmetic_overflow("ledger sequence"))?;

        self.balance = balance_after;
        self.ledger_sequence = sequence;
        self.updated_at = now;

        Ok(LedgerPosition {
            balance_after,
            sequence,
        })
    }
}
