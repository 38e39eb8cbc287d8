//! Debtline Core - Business logic for liability aggregation
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (AccountRecord, ConnectionRecord, User)
//! - **ports**: Trait definitions for external dependencies (LiabilityProvider, LiabilityStore)
//! - **services**: Business logic orchestration (provider manager, reconciliation, summaries)
//! - **adapters**: Concrete implementations (DuckDB, Plaid, Method, demo, manual)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::LiabilityStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    AccountCategory, AccountRecord, AccountSource, ConnectionRecord, ConnectionView, DataMode, User,
};
pub use domain::result::{Error, OperationResult};

/// Main context for Debtline operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, the provider registry and all
/// services.
pub struct DebtlineContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub provider_manager: ProviderManager,
    pub account_service: AccountService,
    pub summary_service: SummaryService,
    pub logging: Option<Arc<LoggingService>>,
}

impl DebtlineContext {
    /// Open the database in `data_dir` and wire up every provider the
    /// configuration allows
    pub fn new(data_dir: &Path, surface: Surface) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let registry = ProviderRegistry::from_config(&config);

        // Event logging is best-effort; a locked logs.duckdb must not block work
        let logging = match LoggingService::new(data_dir, surface, env!("CARGO_PKG_VERSION")) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::warn!("Event log unavailable: {}", e);
                None
            }
        };

        Self::with_registry(data_dir, config, registry, logging)
    }

    /// Build a context around an explicit registry (stub providers in tests)
    pub fn with_registry(
        data_dir: &Path,
        config: Config,
        registry: ProviderRegistry,
        logging: Option<Arc<LoggingService>>,
    ) -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::new(&data_dir.join("debtline.duckdb"))?);

        // Initialize schema
        repository.ensure_schema()?;

        let store: Arc<dyn LiabilityStore> = repository.clone();
        let mut provider_manager = ProviderManager::new(Arc::clone(&store), registry);
        if let Some(logger) = &logging {
            provider_manager = provider_manager.with_logger(Arc::clone(logger));
        }
        let account_service = AccountService::new(Arc::clone(&store));
        let summary_service = SummaryService::new(store);

        Ok(Self {
            config,
            repository,
            provider_manager,
            account_service,
            summary_service,
            logging,
        })
    }

    pub fn store(&self) -> &dyn LiabilityStore {
        self.repository.as_ref()
    }
}
