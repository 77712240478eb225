//! Authentication middleware.
//!
//! Validates the `X-API-Key` header and stores `ApiKeyAuth` in request extensions.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::api_key::{ApiKeyAuth, API_KEY_HEADER};

fn api_key_header(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn authenticate(state: &AppState, api_key: Option<String>) -> Result<ApiKeyAuth, ApiError> {
    let api_key = api_key
        .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

    ApiKeyAuth::validate(&state.pool, &api_key).await
}

/// Middleware that requires a valid API key. Unit scoping is checked by handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, api_key_header(&req)).await {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Middleware for admin-only routes.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, api_key_header(&req)).await {
        Ok(auth) if auth.is_admin => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Ok(_) => ApiError::Forbidden("Admin access required".to_string()).into_response(),
        Err(err) => err.into_response(),
    }
}
