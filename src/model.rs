//! Core domain types for the ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

/// User identifier.
pub type UserId = String;

/// Transaction identifier.
pub type TxId = String;

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// A ledger account holder.
///
/// `balance` is only ever changed by the [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// New user with a generated id and a zero balance.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(fresh_id(), name)
    }

    /// New user with a caller-chosen id and a zero balance.
    pub fn with_id(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance: Amount::ZERO,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount;
    }

    pub fn debit(&mut self, amount: Amount) {
        self.balance -= amount;
    }
}

/// Lifecycle of a transaction record.
///
/// Rows start `Open` and are moved exactly once to `Booked` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionState {
    #[default]
    Open,
    Booked,
    Failed,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Open => "OPEN",
            TransactionState::Booked => "BOOKED",
            TransactionState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionState::Open)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded money movement.
///
/// Credits have no source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TxId,
    #[serde(rename = "senderId", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<UserId>,
    #[serde(rename = "receiverId")]
    pub destination_id: UserId,
    pub amount: Amount,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// New `Open` transfer from `source` to `destination`.
    pub fn transfer(source: &str, destination: &str, amount: Amount) -> Self {
        Self::open(Some(source.to_owned()), destination, amount)
    }

    /// New `Open` credit to `destination`.
    pub fn credit(destination: &str, amount: Amount) -> Self {
        Self::open(None, destination, amount)
    }

    fn open(source_id: Option<UserId>, destination: &str, amount: Amount) -> Self {
        Self {
            id: fresh_id(),
            source_id,
            destination_id: destination.to_owned(),
            amount,
            state: TransactionState::Open,
            created_at: Utc::now(),
        }
    }

    pub fn is_credit(&self) -> bool {
        self.source_id.is_none()
    }
}

/// An operation submitted to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Register a new user with a zero balance.
    Open { user: UserId, name: String },
    /// Increase a single user's balance.
    Credit { user: UserId, amount: Amount },
    /// Move funds between two users.
    Transfer {
        source: UserId,
        destination: UserId,
        amount: Amount,
    },
}
