//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O.

mod account;
mod connection;
mod user;
pub mod result;

pub use account::{
    normalize_balance, normalize_rate, AccountCategory, AccountRecord, AccountSource,
    ReconciliationKey,
};
pub use connection::{ConnectionRecord, ConnectionView, DataMode, DEMO_INSTITUTION};
pub use user::User;
