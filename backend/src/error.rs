//! Application error handling
//!
//! This module provides unified error handling for the API, converting
//! internal errors to HTTP responses. It is the only place where an error
//! kind is mapped to a status code.

use crate::services::AccountError;
use account_manager_shared::ErrorResponse;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

/// Message shared by unknown-account and wrong-password failures
pub const INVALID_CREDENTIALS: &str = "invalid_credentials";

/// API error type that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("unauthorized".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Validation(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Conflict(msg) => msg,
            ApiError::Internal(err) => {
                error!("Internal error: {:?}", err);
                "Internal Server Error".to_string()
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::DuplicateEmail(_) | AccountError::DuplicateUsername(_) => {
                ApiError::Conflict(err.to_string())
            }
            AccountError::AccountNotFound | AccountError::InvalidPassword => {
                ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
            }
            AccountError::LoginBlocked => ApiError::Unauthorized(err.to_string()),
            AccountError::CredentialVerification(ref source) => {
                warn!(error = %source, "Stored credential could not be verified");
                ApiError::BadRequest("credential_verification_failed".to_string())
            }
            AccountError::Hashing(_)
            | AccountError::GuardUnavailable(_)
            | AccountError::Persistence(_) => ApiError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid payload. Expected JSON: {}", rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
