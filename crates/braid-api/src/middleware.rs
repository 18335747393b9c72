use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Authenticated identity attached to each request. Commands receive this
/// explicitly; there is no ambient current-user context.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve a session token to its user, sliding the expiry forward by the
/// full TTL window. Fails Unauthorized when the token is absent from the
/// store, revoked, or expired.
pub fn validate_session(state: &AppState, token: &str) -> ApiResult<CurrentUser> {
    let new_expiry = braid_db::timestamp(Utc::now() + Duration::days(state.session_ttl_days));
    let user = state
        .db
        .validate_session(token, &new_expiry)?
        .ok_or(ApiError::Unauthorized)?;
    Ok(CurrentUser {
        id: user.id,
        name: user.name,
    })
}

/// Extract and validate the session token from the Authorization header.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let user = validate_session(&state, token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
