//! API request and response types
//!
//! Every response body is wrapped in an envelope carrying a `status` of
//! `"ok"` or `"error"`. Successful responses put their payload under `data`,
//! failures carry a single `error` message.

use crate::validation::validate_username;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Envelope status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Successful response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub status: ResponseStatus,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: ResponseStatus::Ok,
            data,
        }
    }
}

/// Error response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: ResponseStatus,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            error: error.into(),
        }
    }
}

/// Registration request
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login request
///
/// `username` accepts either the account's username or its email address.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenData {
    pub auth_token: String,
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
}

/// Account payload wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountData {
    pub account: AccountProfile,
}
