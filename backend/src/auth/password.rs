//! Salted credential hashing
//!
//! Stored credentials have the shape `{salt};{digest}` where the digest is
//! Argon2id over `{salt}.{plaintext}`, keyed with the salt bytes. Hashing is
//! deterministic for a given (plaintext, salt) pair, so verification only
//! needs the stored string.
//!
//! # Performance Considerations
//!
//! Argon2 is intentionally CPU-intensive. Async callers should use the
//! `*_async` variants, which run on the blocking thread pool.

use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        Output,
    },
    Argon2,
};
use thiserror::Error;

/// Separator between salt and digest. Never part of [`SALT_ALPHABET`].
pub const HASH_SALT_DELIMITER: char = ';';

/// Number of characters in a generated salt
pub const SALT_SIZE: usize = 16;

/// Characters a salt is drawn from
pub const SALT_ALPHABET: &[u8] =
    b"qwertyuiopasdfghjklzxcvbnmQWERTYUIOPASDFGHJKLZXCVBNM1234567890!@#$%^&*()";

/// Shortest salt Argon2 accepts
pub const MIN_SALT_LEN: usize = 8;

const DIGEST_LEN: usize = 32;

/// Credential hashing errors
#[derive(Error, Debug)]
pub enum HashError {
    #[error("malformed credential hash")]
    MalformedHash,

    /// Salt shorter than [`MIN_SALT_LEN`] or containing the delimiter
    #[error("invalid salt")]
    InvalidSalt,

    #[error("failed to compute digest: {0}")]
    Digest(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Credential hashing service
pub struct CredentialHasher;

impl CredentialHasher {
    /// Hash `plaintext` with the given salt (blocking operation)
    pub fn hash(plaintext: &str, salt: &str) -> Result<String, HashError> {
        if !Self::is_valid_salt(salt) {
            return Err(HashError::InvalidSalt);
        }
        let digest = Self::digest(plaintext, salt)?;
        Ok(format!("{}{}{}", salt, HASH_SALT_DELIMITER, digest))
    }

    /// Verify `plaintext` against a stored hash string (blocking operation)
    ///
    /// The digest comparison is constant-time.
    pub fn verify(plaintext: &str, hash: &str) -> Result<bool, HashError> {
        let (salt, stored) = hash
            .split_once(HASH_SALT_DELIMITER)
            .ok_or(HashError::MalformedHash)?;
        if !Self::is_valid_salt(salt) {
            return Err(HashError::MalformedHash);
        }
        let stored = Output::b64_decode(stored).map_err(|_| HashError::MalformedHash)?;

        Ok(Self::digest(plaintext, salt)? == stored)
    }

    /// Generate a fresh salt from the operating system CSPRNG
    pub fn generate_salt() -> String {
        // Largest multiple of the alphabet size that fits in a byte; bytes at
        // or above it are rejected to keep the selection unbiased.
        let limit = (u8::MAX as usize + 1) / SALT_ALPHABET.len() * SALT_ALPHABET.len();

        let mut salt = String::with_capacity(SALT_SIZE);
        let mut buf = [0u8; 32];
        while salt.len() < SALT_SIZE {
            OsRng.fill_bytes(&mut buf);
            for &byte in buf.iter().filter(|&&b| (b as usize) < limit) {
                if salt.len() == SALT_SIZE {
                    break;
                }
                salt.push(SALT_ALPHABET[byte as usize % SALT_ALPHABET.len()] as char);
            }
        }
        salt
    }

    /// Hash with a freshly generated salt on the blocking thread pool
    pub async fn hash_async(plaintext: String) -> Result<String, HashError> {
        tokio::task::spawn_blocking(move || Self::hash(&plaintext, &Self::generate_salt())).await?
    }

    /// Verify on the blocking thread pool
    pub async fn verify_async(plaintext: String, hash: String) -> Result<bool, HashError> {
        tokio::task::spawn_blocking(move || Self::verify(&plaintext, &hash)).await?
    }

    fn is_valid_salt(salt: &str) -> bool {
        salt.len() >= MIN_SALT_LEN && !salt.contains(HASH_SALT_DELIMITER)
    }

    fn digest(plaintext: &str, salt: &str) -> Result<Output, HashError> {
        let salted = format!("{}.{}", salt, plaintext);
        let mut out = [0u8; DIGEST_LEN];
        Argon2::default()
            .hash_password_into(salted.as_bytes(), salt.as_bytes(), &mut out)
            .map_err(|e| HashError::Digest(e.to_string()))?;
        Output::new(&out).map_err(|e| HashError::Digest(e.to_string()))
    }
}
