//! Route definitions for the account manager API
//!
//! Every route is a handler wrapped in its own [`MiddlewareSet`]; all sets
//! start from the same base of recoverer and logger. Transport concerns
//! (request ids, CORS, timeouts) are applied router-wide as tower layers.

use crate::error::ApiError;
use crate::middleware::{allow_method, logger, recoverer, MiddlewareSet};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod auth;
mod health;


pub use auth::auth_routes;

/// Middleware applied to every route, outermost first
pub fn base_middleware() -> MiddlewareSet {
    MiddlewareSet::new([recoverer(), logger()])
}

/// Create the main application router with all middleware
pub fn create_router(state: AppState) -> Router {
    let base = base_middleware();
    let get_only = base.with(allow_method(Method::GET));

    Router::new()
        .route_service("/", base.wrap_handler(index, state.clone()))
        .route_service(
            "/health",
            get_only.wrap_handler(health::health_check, state.clone()),
        )
        .route_service(
            "/health/ready",
            get_only.wrap_handler(health::readiness_check, state.clone()),
        )
        .route_service(
            "/health/live",
            get_only.wrap_handler(health::liveness_check, state.clone()),
        )
        .route_service("/metrics", get_only.wrap_handler(health::metrics, state.clone()))
        .nest("/api/v1", api_routes(&state, &base))
        .fallback_service(base.wrap_handler(not_found, state.clone()))
        // Apply middleware layers
        .layer(TimeoutLayer::new(state.config().request_timeout()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// API v1 routes
fn api_routes(state: &AppState, base: &MiddlewareSet) -> Router<AppState> {
    Router::new()
        .route_service("/", base.wrap_handler(api_index, state.clone()))
        .nest("/auth", auth::auth_routes(state, base))
}

async fn index() -> &'static str {
    "Account Manager"
}

async fn api_index() -> &'static str {
    "Account Manager API v1"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not_found".to_string())
}
