//! Authentication routes
//!
//! Registration, login and the authenticated profile lookup. Each route
//! builds its own middleware set on top of the shared base set. Password
//! hashing and verification run on the blocking thread pool.

use crate::auth::{authenticator, AuthAccount};
use crate::error::ApiResult;
use crate::middleware::{allow_method, json_content, MiddlewareSet};
use crate::repositories::Account;
use crate::state::AppState;
use account_manager_shared::types::{
    AccountData, AccountProfile, AuthTokenData, DataResponse, LoginRequest, RegisterRequest,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    Json, Router,
};
use validator::Validate;

/// Create auth routes
pub fn auth_routes(state: &AppState, base: &MiddlewareSet) -> Router<AppState> {
    let json_api = base.with(json_content());
    let post_only = json_api.with(allow_method(Method::POST));
    let authenticated = json_api
        .with(allow_method(Method::GET))
        .with(authenticator(state.tokens().clone()));

    Router::new()
        .route_service("/register", post_only.wrap_handler(register, state.clone()))
        .route_service("/login", post_only.wrap_handler(login, state.clone()))
        .route_service("/me", authenticated.wrap_handler(me, state.clone()))
}

fn account_data(account: &Account) -> AccountData {
    AccountData {
        account: AccountProfile {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
        },
    }
}

/// Register a new account
///
/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DataResponse<AccountData>>)> {
    let Json(req) = payload?;
    req.validate()?;

    let account = state
        .accounts()
        .register(&req.email, &req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::ok(account_data(&account))),
    ))
}

/// Log in with a username or email and issue a token
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DataResponse<AuthTokenData>>)> {
    let Json(req) = payload?;

    let account = state.accounts().login(&req.username, &req.password).await?;
    let auth_token = state
        .tokens()
        .sign_account(&account)
        .map_err(anyhow::Error::from)?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::ok(AuthTokenData { auth_token })),
    ))
}

/// Get the authenticated account
///
/// GET /api/v1/auth/me
///
/// # Authentication
/// Requires valid Bearer token in Authorization header.
async fn me(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> ApiResult<Json<DataResponse<AccountData>>> {
    let account = state.accounts().profile(auth.id).await?;
    Ok(Json(DataResponse::ok(account_data(&account))))
}
