//! Mockva Ledger
//!
//! Virtual-account ledger: the transfer engine, the account service, the
//! storage capability traits and their in-memory and PostgreSQL adapters.

pub mod account;
pub mod balance;
pub mod transaction;
pub mod store;
pub mod memory;
pub mod postgres;
pub mod engine;
pub mod service;
pub mod metrics;

pub use account::{Account, AccountEdit, AccountRegistration};
pub use balance::AccountBalance;
pub use transaction::{AccountTransaction, TransferRequest, ValidatedTransfer};
pub use store::{run_in_transaction, AccountBalanceLocker, AccountRepository, LedgerAppender, UnitOfWorkRunner};
pub use memory::{FaultPoint, InMemoryStore, MemoryWork};
pub use postgres::{PgStore, PgWork};
pub use engine::{EngineConfig, TransferContext, TransferEngine, Transfers};
pub use service::{AccountDetails, AccountService};
pub use metrics::{MetricsSnapshot, TransferMetrics};
