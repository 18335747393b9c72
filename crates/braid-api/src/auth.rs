use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use rand::RngCore;

use braid_db::Database;
use braid_gateway::dispatcher::Dispatcher;
use braid_types::api::{AuthResponse, LoginRequest, SignupRequest};

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    /// Sliding session TTL; every validated request pushes expiry this far out.
    pub session_ttl_days: i64,
    /// Done tasks stay visible in default listings for this long.
    pub task_retention_days: i64,
    /// Optional TaskBot announcement template ({title}/{creator} placeholders).
    pub bot_template: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("email is not valid".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| ApiError::Internal)?
        .to_string();

    let user_id = state
        .db
        .create_user(name, email, &password_hash)?
        .ok_or_else(|| ApiError::Conflict("email already registered".into()))?;

    let token = issue_session(&state, user_id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            name: name.to_string(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_email(req.email.trim())?
        .ok_or(ApiError::InvalidCredentials)?;

    // An unparsable stored hash (e.g. the TaskBot's locked marker) fails the
    // same way as a wrong password.
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|_| ApiError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let token = issue_session(&state, user.id)?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        name: user.name,
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = crate::middleware::bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    state.db.revoke_session(token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a session and return its opaque token: 32 random bytes, hex-encoded.
fn issue_session(state: &AppState, user_id: i64) -> ApiResult<String> {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    let expires_at = braid_db::timestamp(Utc::now() + Duration::days(state.session_ttl_days));
    state.db.create_session(&token, user_id, &expires_at)?;
    Ok(token)
}
