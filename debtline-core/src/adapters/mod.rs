//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the LiabilityStore port
//! - Plaid and Method HTTP clients for LiabilityProvider
//! - Demo data and manual entry for LiabilityProvider

pub mod demo;
pub mod duckdb;
pub mod manual;
pub mod method;
pub mod plaid;
mod wire;

#[cfg(test)]
mod mock_http;
#[cfg(test)]
pub mod method_mock;
#[cfg(test)]
pub mod plaid_mock;
