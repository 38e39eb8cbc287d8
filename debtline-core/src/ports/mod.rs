//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod provider;
mod store;

pub(crate) use provider::find_in_batch;
pub use provider::{
    ConnectOptions, ConnectResult, LiabilityProvider, SessionGrant, WebhookEvent,
};
pub use store::LiabilityStore;
