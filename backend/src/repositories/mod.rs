//! Database repositories
//!
//! Provides data access layer for account records.

pub mod account;
pub mod memory;

pub use account::{
    Account, AccountRepository, NewAccount, PgAccountRepository, RepositoryError, UniqueField,
};
pub use memory::InMemoryAccountRepository;
