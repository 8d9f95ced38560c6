//! The request gate: every protected route passes through [`require_auth`]
//! before its handler runs. Unprotected routes (login, registration, the
//! public pages) are simply not layered with it.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::gateway::AppState;

/// The authenticated identity, attached to request extensions on success.
/// Resolved from the token alone — the store is not consulted here.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

/// Extract `Authorization: Bearer <token>` if present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Reject the request with 401 unless it carries a valid bearer token; on
/// success, stash the subject for downstream handlers. Handlers behind this
/// layer never run on a failed check.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Authentication)?;
    let claims = state.tokens.verify(token)?;
    req.extensions_mut().insert(AuthUser {
        username: claims.sub,
    });
    Ok(next.run(req).await)
}
