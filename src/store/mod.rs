//! Storage contract for users and transaction records.
//!
//! Every method is its own all-or-nothing unit of work. Callers must not
//! assume atomicity across calls.

use async_trait::async_trait;
use thiserror::Error;

use crate::Amount;
use crate::model::{Transaction, TransactionState, User};

mod memory;
pub use memory::InMemoryStore;

/// Error returned by a [`LedgerStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn user_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "user",
            id: id.to_owned(),
        }
    }

    pub fn transaction_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "transaction",
            id: id.to_owned(),
        }
    }
}

/// Durable keeper of users and transaction records. No business rules.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] if the user is absent.
    async fn read_user(&self, id: &str) -> Result<User, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn create_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    async fn update_transaction_state(
        &self,
        id: &str,
        state: TransactionState,
    ) -> Result<(), StoreError>;

    async fn read_balance(&self, user_id: &str) -> Result<Amount, StoreError>;

    async fn update_balance(&self, user_id: &str, balance: Amount) -> Result<(), StoreError>;

    /// All transaction records, newest first.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
}
