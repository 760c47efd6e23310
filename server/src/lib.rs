//! Mockva Server
//!
//! HTTP front end for the virtual-account ledger: account registration and
//! edit, fund transfers, version and transfer metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use tracing::info;

use mockva_common::Result;
use mockva_ledger::{
    AccountBalanceLocker, AccountRepository, AccountService, EngineConfig, InMemoryStore,
    LedgerAppender, PgStore, TransferEngine, UnitOfWorkRunner,
};

pub use config::{ServerConfig, StorageBackend};
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;

/// Open the configured storage backend and wire the engine and account
/// service over it.
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Ok(state_over(Arc::new(InMemoryStore::new()), config))
        }
        StorageBackend::Postgres => {
            info!(
                host = %config.database.host,
                database = %config.database.name,
                max_connections = config.database.max_connections,
                "Connecting to PostgreSQL"
            );
            let store = PgStore::connect(&config.database.url(), config.database.max_connections)
                .await?
                .with_lock_timeout(config.transfer_timeout);
            if config.database.run_migrations {
                store.migrate().await?;
                info!("Migrations applied");
            }
            Ok(state_over(Arc::new(store), config))
        }
    }
}

/// Handler state over one store serving every storage capability.
pub fn state_over<S>(store: Arc<S>, config: &ServerConfig) -> AppState
where
    S: UnitOfWorkRunner
        + AccountBalanceLocker<S::Work>
        + LedgerAppender<S::Work>
        + AccountRepository
        + 'static,
{
    let engine = TransferEngine::from_store(store.clone()).with_config(EngineConfig {
        default_timeout: Some(config.transfer_timeout),
    });
    AppState::new(
        Arc::new(engine),
        AccountService::new(store),
        config.transfer_timeout,
    )
}
