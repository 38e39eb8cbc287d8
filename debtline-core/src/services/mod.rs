//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod api;
pub mod logging;
pub mod migration;
mod provider_manager;
pub mod reconcile;
mod registry;
mod summary;

pub use account::{AccountService, ManualAccountInput};
pub use api::ApiResponse;
pub use logging::{LogEntry, LogEvent, LogFilter, LogStats, LoggingService, Surface};
pub use migration::{MigrationResult, MigrationService};
pub use provider_manager::{ExchangeOutcome, ProviderManager, SyncSummary, WebhookOutcome};
pub use reconcile::{plan_reconciliation, ReconcilePlan};
pub use registry::{ProviderRegistry, RegistryBuilder};
pub use summary::{summarize_accounts, CategoryTotal, DebtSummary, NextDue, SummaryService};
