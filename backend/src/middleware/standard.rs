//! Standard middleware building blocks
//!
//! Combine in this relative order: [`recoverer`], [`logger`],
//! [`json_content`], [`allow_method`], then the authenticator.

use super::Middleware;
use crate::error::ApiError;
use account_manager_shared::ErrorResponse;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        header::{ALLOW, CONNECTION, CONTENT_TYPE, USER_AGENT},
        HeaderValue, Method, StatusCode,
    },
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info};

/// Catch panics from everything inside and answer 500
///
/// Must be the outermost middleware of a set.
pub fn recoverer() -> Middleware {
    Middleware::from_layer("recoverer", from_fn(recover))
}

/// Log one event per request
pub fn logger() -> Middleware {
    Middleware::from_layer("logger", from_fn(log_request))
}

/// Mark responses as JSON
pub fn json_content() -> Middleware {
    Middleware::from_layer("json_content", from_fn(set_json_content_type))
}

/// Answer 405 for any method other than `method`
pub fn allow_method(method: Method) -> Middleware {
    Middleware::from_layer("allow_method", from_fn_with_state(method, enforce_method))
}

async fn recover(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            error!(
                %method,
                %path,
                panic = %panic_message(panic.as_ref()),
                "Error handling http request"
            );
            metrics::counter!("http_panics_total").increment(1);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONNECTION, "close")],
                Json(ErrorResponse::new("Internal Server Error")),
            )
                .into_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let timestamp = Utc::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    info!(
        %timestamp,
        %client,
        %user_agent,
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );

    response
}

async fn set_json_content_type(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

async fn enforce_method(State(allowed): State<Method>, request: Request, next: Next) -> Response {
    if *request.method() != allowed {
        let mut response =
            ApiError::MethodNotAllowed(format!("Only {} method allowed", allowed)).into_response();
        if let Ok(value) = HeaderValue::from_str(allowed.as_str()) {
            response.headers_mut().insert(ALLOW, value);
        }
        return response;
    }

    next.run(request).await
}
