//! Funds-movement engine.
//!
//! Books transfers and credits against a [`LedgerStore`]. Every operation
//! writes its transaction row first, takes the account locks, mutates
//! balances one store call at a time, reverts a partial debit/credit when a
//! later write fails, and finally records `BOOKED` or `FAILED`.
//! Also supports async stream of operations.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::Amount;
use crate::model::{Operation, Transaction, TransactionState, User};
use crate::store::LedgerStore;

mod locks;
pub use locks::{AccountGuard, AccountLocks};

mod error;
pub use error::{EngineError, ErrorKind, ValidationError};

/// The ledger engine.
///
/// Holds the store of record and the process-wide account lock registry.
/// Share it between workers behind an `Arc`.
pub struct Engine<S> {
    store: Arc<S>,
    locks: AccountLocks,
}

/// Public API
impl<S: LedgerStore> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: AccountLocks::new(),
        }
    }

    /// Run the engine over the given operation stream
    pub async fn run(&self, mut stream: impl Stream<Item = Operation> + Unpin) {
        while let Some(op) = stream.next().await {
            // a failed operation never stops the stream
            if let Err(e) = self.apply(op).await {
                warn!(kind = ?e.kind(), "{e}");
            }
        }
    }

    /// Apply a single operation
    pub async fn apply(&self, op: Operation) -> Result<(), EngineError> {
        match op {
            Operation::Open { user, name } => {
                self.create_user(User::with_id(user, name)).await?;
            }
            Operation::Credit { user, amount } => {
                self.credit(&user, amount).await?;
            }
            Operation::Transfer {
                source,
                destination,
                amount,
            } => {
                self.transfer(&source, &destination, amount).await?;
            }
        }
        Ok(())
    }

    /// Move `amount` from `source` to `destination`.
    ///
    /// On success both balances have been written and the returned
    /// transaction is `BOOKED`. On failure neither balance has changed
    /// (unless a compensating write itself failed, which is only logged) and
    /// the stored transaction is `FAILED`.
    pub async fn transfer(
        &self,
        source: &str,
        destination: &str,
        amount: Amount,
    ) -> Result<Transaction, EngineError> {
        require_id(source, "source id")?;
        require_id(destination, "destination id")?;
        require_positive(amount)?;
        if source == destination {
            return Err(ValidationError::SameAccount(source.to_owned()).into());
        }

        let mut tx = Transaction::transfer(source, destination, amount);
        self.store.create_transaction(&tx).await?;

        let _guard = self.locks.lock_pair(source, destination).await;
        let result = self
            .move_funds(&tx.id, source, destination, amount)
            .await;
        self.conclude(&mut tx, &result).await;
        Self::log_result("transfer", &tx, &result);

        result.map(|()| tx)
    }

    /// Increase `user`'s balance by `amount` and return the balance read
    /// back from the store once the credit is booked.
    ///
    /// A failed read-back is returned as an error even though the credit
    /// itself has already been committed and booked.
    pub async fn credit(&self, user: &str, amount: Amount) -> Result<Amount, EngineError> {
        require_id(user, "user id")?;
        require_positive(amount)?;

        let mut tx = Transaction::credit(user, amount);
        self.store.create_transaction(&tx).await?;

        let _guard = self.locks.lock(user).await;
        let result = self.deposit(&tx.id, user, amount).await;
        self.conclude(&mut tx, &result).await;
        Self::log_result("credit", &tx, &result);
        result?;

        self.store.read_balance(user).await.map_err(|e| {
            warn!(tx = %tx.id, user, error = %e, "credit booked but balance read-back failed");
            EngineError::from(e)
        })
    }

    /// All transaction records, newest first.
    pub async fn transactions(&self) -> Result<Vec<Transaction>, EngineError> {
        Ok(self.store.list_transactions().await?)
    }

    /// Register a new user. The opening balance must be zero.
    pub async fn create_user(&self, user: User) -> Result<User, EngineError> {
        require_id(&user.id, "user id")?;
        if user.name.trim().is_empty() {
            return Err(ValidationError::MissingName.into());
        }
        if user.balance != Amount::ZERO {
            return Err(ValidationError::OpeningBalance(user.id).into());
        }

        self.store.create_user(&user).await?;
        info!(user = %user.id, name = %user.name, "user created");
        Ok(user)
    }

    pub async fn user(&self, id: &str) -> Result<User, EngineError> {
        require_id(id, "user id")?;
        Ok(self.store.read_user(id).await?)
    }

    pub async fn users(&self) -> Result<Vec<User>, EngineError> {
        Ok(self.store.list_users().await?)
    }
}

/// Private API
impl<S: LedgerStore> Engine<S> {
    /// Small helper to log operation results
    fn log_result<T>(kind: &str, tx: &Transaction, result: &Result<T, EngineError>) {
        let source = tx.source_id.as_deref().unwrap_or("-");
        match result {
            Ok(_) => {
                info!(
                    tx = %tx.id,
                    source,
                    destination = %tx.destination_id,
                    amount = %tx.amount,
                    "{kind} booked"
                );
            }
            Err(e) => {
                warn!(
                    tx = %tx.id,
                    source,
                    destination = %tx.destination_id,
                    amount = %tx.amount,
                    reason = %e,
                    "{kind} failed"
                );
            }
        }
    }

    /// Debit `source`, credit `destination`. Caller holds both locks.
    /// - Read both users
    /// - Ensure the source covers the amount
    /// - Persist the debit, then the credit
    /// - Revert the debit if the credit cannot be persisted
    ///
    /// A failed balance write is always a storage failure, whatever the
    /// store reported.
    async fn move_funds(
        &self,
        tx: &str,
        source: &str,
        destination: &str,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let mut source = self.store.read_user(source).await?;
        let mut destination = self.store.read_user(destination).await?;

        if source.balance < amount {
            return Err(EngineError::InsufficientFunds {
                user: source.id,
                available: source.balance,
                requested: amount,
            });
        }

        source.debit(amount);
        self.store
            .update_balance(&source.id, source.balance)
            .await
            .map_err(EngineError::Storage)?;

        destination.credit(amount);
        if let Err(e) = self
            .store
            .update_balance(&destination.id, destination.balance)
            .await
        {
            source.credit(amount);
            self.compensate(tx, &source).await;
            return Err(EngineError::Storage(e));
        }

        Ok(())
    }

    /// Credit `user`. Caller holds the account lock.
    async fn deposit(&self, tx: &str, user: &str, amount: Amount) -> Result<(), EngineError> {
        let mut account = self.store.read_user(user).await?;

        account.credit(amount);
        if let Err(e) = self
            .store
            .update_balance(&account.id, account.balance)
            .await
        {
            account.debit(amount);
            self.compensate(tx, &account).await;
            return Err(EngineError::Storage(e));
        }

        Ok(())
    }

    /// Write back a reverted balance. Failure is logged, never returned or retried.
    async fn compensate(&self, tx: &str, user: &User) {
        match self.store.update_balance(&user.id, user.balance).await {
            Ok(()) => {
                warn!(tx, user = %user.id, balance = %user.balance, "balance reverted");
            }
            Err(e) => {
                error!(
                    tx,
                    user = %user.id,
                    balance = %user.balance,
                    error = %e,
                    "balance revert failed, account may be inconsistent"
                );
            }
        }
    }

    /// Record the terminal state. Failure is logged and the row stays `OPEN`.
    async fn conclude<T>(&self, tx: &mut Transaction, result: &Result<T, EngineError>) {
        debug_assert!(!tx.state.is_terminal(), "transaction {} concluded twice", tx.id);

        let state = match result {
            Ok(_) => TransactionState::Booked,
            Err(_) => TransactionState::Failed,
        };
        tx.state = state;

        if let Err(e) = self.store.update_transaction_state(&tx.id, state).await {
            error!(tx = %tx.id, %state, error = %e, "failed to record transaction state");
        }
    }
}

fn require_id(id: &str, what: &'static str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::MissingId(what));
    }
    Ok(())
}

fn require_positive(amount: Amount) -> Result<(), ValidationError> {
    if !amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(())
}
