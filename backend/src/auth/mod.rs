//! Authentication module
//!
//! Salted credential hashing, signed claims tokens, the failed-login guard
//! and the request authenticator.

mod guard;
mod jwt;
mod middleware;
mod password;

pub use guard::{GuardError, GuardPolicy, LoginGuard, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW};
pub use jwt::{AccountClaims, ClaimMap, TokenConfigError, TokenError, TokenService};
pub use middleware::{authenticate, authenticator, AuthAccount};
pub use password::{
    CredentialHasher, HashError, HASH_SALT_DELIMITER, MIN_SALT_LEN, SALT_ALPHABET, SALT_SIZE,
};
