//! Pre-shared key guard for the `/api` routes.
//!
//! The key is accepted from `x-api-key` or as a bearer token and compared in
//! constant time.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Key presented by the caller, preferring `x-api-key` over a bearer token.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
}

fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Middleware: without a configured key every request passes (dev mode).
pub async fn psk_auth_layer(expected_psk: Option<String>, request: Request, next: Next) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let verdict = presented_key(request.headers()).map(|key| keys_match(key, &expected));
    match verdict {
        Some(true) => next.run(request).await,
        Some(false) => {
            tracing::debug!(path = %request.uri().path(), "Rejected request with wrong API key");
            AppError::Unauthorized("Invalid API key".to_string()).into_response()
        }
        None => AppError::Unauthorized("Missing or invalid API key".to_string()).into_response(),
    }
}
