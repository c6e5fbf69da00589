//! Claims token signing and verification
//!
//! Tokens are HS256 JWTs carrying an arbitrary claim map. Keys are derived
//! once at startup and shared behind `Arc`s, so the service is cheap to clone
//! into every handler.

use crate::repositories::Account;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Arbitrary claim set embedded in a token
pub type ClaimMap = Map<String, Value>;

/// Raised at startup when no usable signing key is configured
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("no token signing key configured")]
    MissingSigningKey,
}

/// Token signing and verification errors
#[derive(Error, Debug)]
pub enum TokenError {
    /// Signature mismatch or structurally broken token
    #[error("invalid token")]
    InvalidToken,

    /// Well-formed token refused for another reason (expired, wrong algorithm, ...)
    #[error("token rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("token claims do not describe an account: {0}")]
    Claims(#[source] serde_json::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            // Only HS256 is ever issued, so any other `alg` is a forged header
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::InvalidToken,
            _ => TokenError::Rejected(err),
        }
    }
}

/// Identity claims carried by login tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClaims {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<&Account> for AccountClaims {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
        }
    }
}

/// Pre-computed signing keys
#[derive(Clone)]
struct TokenKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

/// Token service
///
/// Construct once at startup and store in `AppState`.
#[derive(Clone)]
pub struct TokenService {
    keys: TokenKeys,
    validation: Arc<Validation>,
    expiry: Option<Duration>,
}

impl TokenService {
    /// Create a token service from the configured secret
    ///
    /// `expiry_secs` of `None` (or zero) issues tokens without an `exp` claim.
    pub fn new(secret: &str, expiry_secs: Option<i64>) -> Result<Self, TokenConfigError> {
        if secret.is_empty() {
            return Err(TokenConfigError::MissingSigningKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked when present but not required
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Ok(Self {
            keys: TokenKeys {
                encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
                decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            },
            validation: Arc::new(validation),
            expiry: expiry_secs.filter(|secs| *secs > 0).map(Duration::seconds),
        })
    }

    /// Sign a claim map
    ///
    /// The token embeds exactly the given claims, plus `iat`/`exp` when a
    /// lifetime is configured.
    pub fn sign(&self, claims: &ClaimMap) -> Result<String, TokenError> {
        let mut payload = claims.clone();
        if let Some(expiry) = self.expiry {
            let now = Utc::now();
            payload.insert("iat".to_string(), Value::from(now.timestamp()));
            payload.insert("exp".to_string(), Value::from((now + expiry).timestamp()));
        }

        encode(&Header::new(Algorithm::HS256), &payload, &self.keys.encoding)
            .map_err(TokenError::Signing)
    }

    /// Verify a token and return its claim map
    pub fn verify(&self, token: &str) -> Result<ClaimMap, TokenError> {
        let data = decode::<ClaimMap>(token, &self.keys.decoding, &self.validation)?;
        Ok(data.claims)
    }

    /// Sign the identity claims of an account
    pub fn sign_account(&self, account: &Account) -> Result<String, TokenError> {
        let mut claims = ClaimMap::new();
        claims.insert("id".to_string(), Value::from(account.id));
        claims.insert("email".to_string(), Value::from(account.email.as_str()));
        claims.insert("username".to_string(), Value::from(account.username.as_str()));
        self.sign(&claims)
    }

    /// Verify a token and decode its identity claims
    pub fn verify_account(&self, token: &str) -> Result<AccountClaims, TokenError> {
        let claims = self.verify(token)?;
        serde_json::from_value(Value::Object(claims)).map_err(TokenError::Claims)
    }

    /// Configured token lifetime in seconds
    #[inline]
    pub fn expiry_secs(&self) -> Option<i64> {
        self.expiry.map(|d| d.num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn create_test_service() -> TokenService {
        TokenService::new("test-secret", None).unwrap()
    }

    fn sample_claims() -> ClaimMap {
        json!({"id": 7, "email": "a@example.com", "username": "alice"})
            .as_object()
            .cloned()
            .unwrap()
    }

    const BASE64URL: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    #[test]
    fn test_empty_secret_is_config_error() {
        assert_eq!(
            TokenService::new("", Some(3600)).err(),
            Some(TokenConfigError::MissingSigningKey)
        );
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let service = create_test_service();
        let claims = sample_claims();

        let token = service.sign(&claims).unwrap();
        assert_eq!(service.verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_every_single_character_change_is_invalid() {
        let service = create_test_service();
        let token = service.sign(&sample_claims()).unwrap();

        for (idx, original) in token.bytes().enumerate() {
            if original == b'.' {
                continue;
            }
            for &replacement in BASE64URL.iter().filter(|&&c| c != original) {
                let mut bytes = token.as_bytes().to_vec();
                bytes[idx] = replacement;
                let tampered = String::from_utf8(bytes).unwrap();

                let result = service.verify(&tampered);
                assert!(
                    matches!(result, Err(TokenError::InvalidToken)),
                    "position {} -> {:?}: {:?}",
                    idx,
                    replacement as char,
                    result
                );
            }
        }
    }

    #[test]
    fn test_header_with_other_algorithm_is_invalid() {
        let service = create_test_service();
        let token = encode(
            &Header::new(Algorithm::HS384),
            &sample_claims(),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(service.verify(&token), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let service = create_test_service();
        assert!(matches!(
            service.verify("invalid.token.here"),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(service.verify("nodots"), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn test_token_from_other_key_is_invalid() {
        let other = TokenService::new("wrong-secret-key", None).unwrap();
        let token = other.sign(&sample_claims()).unwrap();

        assert!(matches!(
            create_test_service().verify(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_expiry_claims_added_when_configured() {
        let service = TokenService::new("test-secret", Some(3600)).unwrap();
        let claims = service.verify(&service.sign(&sample_claims()).unwrap()).unwrap();

        assert!(claims.contains_key("exp"));
        assert!(claims.contains_key("iat"));
        assert_eq!(claims["username"], "alice");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = create_test_service();
        let mut claims = sample_claims();
        claims.insert("exp".to_string(), Value::from(Utc::now().timestamp() - 60));

        let token = service.sign(&claims).unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn test_account_claims_round_trip() {
        let service = TokenService::new("test-secret", Some(3600)).unwrap();
        let account = Account {
            id: 42,
            email: "bob@example.com".to_string(),
            username: "bob".to_string(),
            password_hash: "salt;digest".to_string(),
            created_at: Utc::now(),
        };

        let token = service.sign_account(&account).unwrap();
        let claims = service.verify_account(&token).unwrap();
        assert_eq!(claims, AccountClaims::from(&account));
        assert!(!token.contains("salt;digest"));
    }

    #[test]
    fn test_foreign_claims_are_not_an_account() {
        let service = create_test_service();
        let mut claims = ClaimMap::new();
        claims.insert("sub".to_string(), Value::from("someone"));

        let token = service.sign(&claims).unwrap();
        assert!(matches!(
            service.verify_account(&token),
            Err(TokenError::Claims(_))
        ));
    }

    #[test]
    fn test_service_is_clone_cheap() {
        let service = create_test_service();
        let _cloned = service.clone(); // Should be cheap due to Arc
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_verify_returns_signed_claims(
            id in any::<i64>(),
            email in "[a-z]{1,10}@[a-z]{1,10}\\.com",
            username in "[a-zA-Z0-9_]{3,20}",
        ) {
            let service = create_test_service();
            let mut claims = ClaimMap::new();
            claims.insert("id".to_string(), Value::from(id));
            claims.insert("email".to_string(), Value::from(email));
            claims.insert("username".to_string(), Value::from(username));

            let token = service.sign(&claims).unwrap();
            prop_assert_eq!(service.verify(&token).unwrap(), claims);
        }
    }
}
