//! Google sign-in. The identity provider attests email ownership, so an
//! account reached this way is verified without the emailed-code step.

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::storage::NewUser;
use crate::web::session;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Callbacks older than this are rejected along with their state parameter.
const STATE_MAX_AGE_SECS: i64 = 600;

#[derive(Clone)]
pub struct GoogleOauth {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl GoogleOauth {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok()?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok()?,
            redirect_url: std::env::var("GOOGLE_REDIRECT_URL").ok()?,
        })
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleProfile {
    email: Option<String>,
    name: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/google", get(google_redirect))
        .route("/google/callback", get(google_callback))
        .with_state(state)
}

/// Anti-CSRF state: signed issue timestamp, checked again on callback.
fn issue_state(key: &[u8]) -> Result<String, ApiError> {
    let ts = Utc::now().timestamp().to_string();
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("invalid session key")))?;
    mac.update(ts.as_bytes());
    let sig = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{ts}.{sig}"))
}

fn verify_state(value: &str, key: &[u8]) -> bool {
    let Some((ts, sig_b64)) = value.split_once('.') else {
        return false;
    };
    let Ok(sig) = general_purpose::URL_SAFE_NO_PAD.decode(sig_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(ts.as_bytes());
    if mac.verify_slice(&sig).is_err() {
        return false;
    }
    let Ok(issued) = ts.parse::<i64>() else {
        return false;
    };
    Utc::now().timestamp() - issued <= STATE_MAX_AGE_SECS
}

fn google_config(state: &SharedState) -> Result<&GoogleOauth, ApiError> {
    state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Google sign-in is not configured")))
}

async fn google_redirect(State(state): State<SharedState>) -> ApiResult<Redirect> {
    let google = google_config(&state)?;
    let oauth_state = issue_state(&state.session_key)?;

    let url = Url::parse_with_params(
        AUTH_URL,
        &[
            ("client_id", google.client_id.as_str()),
            ("redirect_uri", google.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to build auth URL: {err}")))?;

    Ok(Redirect::to(url.as_str()))
}

async fn google_callback(
    State(state): State<SharedState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<impl IntoResponse> {
    let google = google_config(&state)?;

    if !query
        .state
        .as_deref()
        .is_some_and(|value| verify_state(value, &state.session_key))
    {
        return Err(ApiError::unauthorized("Invalid OAuth state"));
    }

    if let Some(error) = query.error {
        tracing::warn!("Google sign-in denied: {error}");
        return Err(ApiError::unauthorized("Google sign-in failed"));
    }
    let code = query
        .code
        .ok_or_else(|| ApiError::unauthorized("Google sign-in failed"))?;

    let http = reqwest::Client::new();
    let token: TokenResponse = http
        .post(TOKEN_URL)
        .form(&[
            ("code", code.as_str()),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", google.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("token exchange failed: {err}")))?
        .error_for_status()
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("token exchange rejected: {err}")))?
        .json()
        .await
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("unreadable token response: {err}")))?;

    let profile: GoogleProfile = http
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("userinfo fetch failed: {err}")))?
        .error_for_status()
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("userinfo fetch rejected: {err}")))?
        .json()
        .await
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("unreadable userinfo: {err}")))?;

    let email = profile
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| ApiError::unauthorized("No email from Google"))?;

    let user = match state.storage.find_user_by_email(&email).await? {
        Some(user) => {
            if !user.verified {
                // Provider-attested email ownership counts as verification.
                state.storage.mark_user_verified(user.id).await?;
            }
            user
        }
        None => {
            let username = profile
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());
            state
                .storage
                .create_user(NewUser {
                    username,
                    email,
                    password_hash: None,
                    verified: true,
                    verification_code: None,
                    verification_code_expires_at: None,
                })
                .await?
        }
    };

    let cookie_headers = session::establish(&state, user.id).await?;
    tracing::info!("user {} logged in via Google", user.id);
    Ok((cookie_headers, Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn state_round_trips() {
        let value = issue_state(KEY).unwrap();
        assert!(verify_state(&value, KEY));
    }

    #[test]
    fn state_rejects_tampering_and_wrong_key() {
        let value = issue_state(KEY).unwrap();
        assert!(!verify_state(&value, b"another-key-entirely-32-bytes!!!"));
        assert!(!verify_state("12345.bogus", KEY));
        assert!(!verify_state("no-separator", KEY));
    }

    #[test]
    fn stale_state_is_rejected() {
        let ts = (Utc::now().timestamp() - STATE_MAX_AGE_SECS - 5).to_string();
        let mut mac = HmacSha256::new_from_slice(KEY).unwrap();
        mac.update(ts.as_bytes());
        let sig = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        assert!(!verify_state(&format!("{ts}.{sig}"), KEY));
    }
}
