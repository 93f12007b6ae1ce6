pub mod amount;
pub mod csv;
pub mod engine;
pub mod model;
pub mod store;

pub use amount::Amount;
pub use engine::{Engine, EngineError, ErrorKind};
pub use model::{Operation, Transaction, TransactionState, TxId, User, UserId};
pub use store::{InMemoryStore, LedgerStore, StoreError};
