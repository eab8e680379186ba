use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::amount::Amount;
use super::category::OTHERS;

/// Whether a transaction reduces or increases the underlying balance.
/// UPI is tracked as its own channel because downstream attribution of
/// card-vs-bank-account differs for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
    Upi,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
            Direction::Upi => "upi",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" => Ok(Direction::Debit),
            "credit" => Ok(Direction::Credit),
            "upi" => Ok(Direction::Upi),
            other => Err(format!("unknown direction: '{other}'")),
        }
    }
}

/// Which table a canonical record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Transaction,
    Bill,
    Statement,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Transaction => write!(f, "transaction"),
            Destination::Bill => write!(f, "bill"),
            Destination::Statement => write!(f, "statement"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("idempotency key is empty")]
    EmptyKey,
    #[error("amount is zero")]
    ZeroAmount,
    #[error("no merchant or counterparty and category defaulted")]
    NoCounterparty,
}

/// The fully normalized, typed representation of one financial event,
/// the only entity written to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Stable per logical transaction: a source reference number when the
    /// alert carries one, otherwise derived from stable fields. Never random.
    pub idempotency_key: String,
    pub amount: Amount,
    pub direction: Direction,
    pub category: String,
    pub merchant: String,
    pub currency: String,
    pub source_timestamp: DateTime<Utc>,
    pub card_ref: Option<String>,
    pub counterparty_payment_id: Option<String>,
    pub remarks: Option<String>,
    pub institution: Option<String>,
}

impl CanonicalTransaction {
    pub fn txn_date(&self) -> NaiveDate {
        self.source_timestamp.date_naive()
    }

    /// Invariants the normalizer must have established. Violations mean an
    /// upstream bug; the persistence gateway still isolates them per row.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.idempotency_key.is_empty() {
            return Err(TransactionError::EmptyKey);
        }
        if self.amount.is_zero() {
            return Err(TransactionError::ZeroAmount);
        }
        if self.merchant.is_empty() && self.category == OTHERS {
            return Err(TransactionError::NoCounterparty);
        }
        Ok(())
    }
}
