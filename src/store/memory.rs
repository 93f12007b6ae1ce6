use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{LedgerStore, StoreError};
use crate::Amount;
use crate::model::{Transaction, TransactionState, User, UserId};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// Append-only, in creation order
    transactions: Vec<Transaction>,
}

/// Process-local [`LedgerStore`]. Each call holds the table lock for its
/// whole duration, which makes every call atomic on its own.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory tables poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict {
                entity: "user",
                id: user.id.clone(),
            });
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn read_user(&self, id: &str) -> Result<User, StoreError> {
        self.tables()?
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::user_not_found(id))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn create_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables.transactions.iter().any(|t| t.id == tx.id) {
            return Err(StoreError::Conflict {
                entity: "transaction",
                id: tx.id.clone(),
            });
        }
        tables.transactions.push(tx.clone());
        Ok(())
    }

    async fn update_transaction_state(
        &self,
        id: &str,
        state: TransactionState,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let tx = tables
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::transaction_not_found(id))?;
        tx.state = state;
        Ok(())
    }

    async fn read_balance(&self, user_id: &str) -> Result<Amount, StoreError> {
        self.tables()?
            .users
            .get(user_id)
            .map(|u| u.balance)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    async fn update_balance(&self, user_id: &str, balance: Amount) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::user_not_found(user_id))?;
        user.balance = balance;
        user.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.tables()?.transactions.iter().rev().cloned().collect())
    }
}
