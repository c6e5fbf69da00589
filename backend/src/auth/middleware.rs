//! Authentication middleware
//!
//! Validates the `Authorization: Bearer <token>` header and attaches the
//! verified account claims to the request for downstream handlers.

use super::jwt::{AccountClaims, TokenService};
use crate::error::ApiError;
use crate::middleware::Middleware;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::{from_fn_with_state, Next},
    response::Response,
};
use tracing::debug;

/// Authenticated account attached by [`authenticate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAccount {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<AccountClaims> for AuthAccount {
    fn from(claims: AccountClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            username: claims.username,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthAccount>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Build the authenticator middleware
pub fn authenticator(tokens: TokenService) -> Middleware {
    Middleware::from_layer("authenticator", from_fn_with_state(tokens, authenticate))
}

/// Reject the request with 401 unless it carries a valid bearer token
pub async fn authenticate(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or_else(ApiError::unauthorized)?;

    let claims = tokens.verify_account(token).map_err(|err| {
        debug!(error = %err, "Rejected bearer token");
        ApiError::unauthorized()
    })?;

    request.extensions_mut().insert(AuthAccount::from(claims));

    Ok(next.run(request).await)
}

/// Token part of an `Authorization` header of exactly two parts
fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;

    let mut parts = header.split_whitespace();
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token)
}
