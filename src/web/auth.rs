use crate::error::{ApiError, ApiResult};
use crate::middleware::client_ip;
use crate::services::mailer::generate_verification_code;
use crate::state::SharedState;
use crate::storage::NewUser;
use crate::web::session::{self, UserSession};
use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// How long a verification code stays usable after registration.
const CODE_TTL_MINUTES: i64 = 15;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub verified: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

async fn register(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.register_limiter.check(&client_ip(&headers)).await {
        return Err(ApiError::RateLimited);
    }

    let mut problems = Vec::new();
    if payload.username.trim().len() < 3 {
        problems.push("username must be at least 3 characters");
    }
    if !is_valid_email(&payload.email) {
        problems.push("email must be a valid address");
    }
    if payload.password.len() < 6 {
        problems.push("password must be at least 6 characters");
    }
    if !problems.is_empty() {
        return Err(ApiError::validation_with(
            "Invalid registration data",
            json!(problems),
        ));
    }

    if state
        .storage
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email already registered"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("password hashing failed: {err}")))?
        .to_string();

    let code = generate_verification_code();
    let user = state
        .storage
        .create_user(NewUser {
            username: payload.username.trim().to_string(),
            email: payload.email.clone(),
            password_hash: Some(password_hash),
            verified: false,
            verification_code: Some(code.clone()),
            verification_code_expires_at: Some(Utc::now() + Duration::minutes(CODE_TTL_MINUTES)),
        })
        .await?;

    // An undelivered code would strand the account, so roll the user back
    // and let the caller retry registration.
    if let Err(err) = state.mailer.send_verification_code(&user.email, &code).await {
        tracing::error!("verification email to {} failed: {err:#}", user.email);
        state.storage.delete_user(user.id).await?;
        return Err(ApiError::Internal(err));
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Verification code sent to email." })),
    ))
}

async fn verify_email(
    State(state): State<SharedState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if payload.email.is_empty() || payload.code.is_empty() {
        return Err(ApiError::validation("Email and code required"));
    }

    let user = state
        .storage
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.verified {
        return Err(ApiError::validation("Already verified"));
    }
    if user.verification_code.as_deref() != Some(payload.code.as_str()) {
        return Err(ApiError::validation("Invalid code"));
    }
    if let Some(expires_at) = user.verification_code_expires_at {
        if expires_at < Utc::now() {
            return Err(ApiError::validation("Code expired"));
        }
    }

    state.storage.mark_user_verified(user.id).await?;
    tracing::info!("user {} verified their email", user.id);

    Ok(Json(json!({ "message": "Email verified" })))
}

async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.login_limiter.check(&client_ip(&headers)).await {
        return Err(ApiError::RateLimited);
    }

    let user = state
        .storage
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !user.verified {
        return Err(ApiError::unauthorized(
            "Please verify your email before logging in.",
        ));
    }

    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| ApiError::unauthorized("Invalid email or password"))?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid email or password"))?;

    let cookie_headers = session::establish(&state, user.id).await?;
    tracing::info!("user {} logged in", user.id);

    Ok((
        cookie_headers,
        Json(UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            verified: user.verified,
        }),
    ))
}

async fn logout(
    session: UserSession,
    State(state): State<SharedState>,
) -> ApiResult<impl IntoResponse> {
    state.storage.delete_session(session.session_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        session::clear_session_cookie()
            .parse()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("invalid session cookie value")))?,
    );
    Ok((headers, Json(json!({ "message": "Logged out" }))))
}

async fn me(session: UserSession, State(state): State<SharedState>) -> ApiResult<Json<UserResponse>> {
    let user = session.user(&state).await?;
    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        verified: user.verified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a b@x.com"));
    }
}
