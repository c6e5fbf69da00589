//! Business logic services
//!
//! Services encapsulate business logic and coordinate between
//! repositories and the authentication primitives.

pub mod account;

pub use account::{AccountError, AccountService};
