//! Account Manager Shared Library
//!
//! Wire types and input validation shared between the backend and any
//! client talking to it.

pub mod types;
pub mod validation;

// Re-export commonly used items
pub use types::*;
