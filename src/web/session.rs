//! Cookie sessions. The cookie carries an HMAC-signed pointer to a session
//! row; the row is authoritative, so logout (row deletion) kills the token
//! even if a client keeps replaying the cookie.

use crate::domain::models::User;
use crate::error::ApiError;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub session_id: Uuid,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
}

pub fn sign_session(
    session_id: Uuid,
    expires_at: DateTime<Utc>,
    key: &[u8],
) -> Result<String, TokenError> {
    let payload = format!("{}|{}", session_id, expires_at.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| TokenError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, TokenError> {
    let Some((payload_b64, sig_b64)) = token.split_once('.') else {
        return Err(TokenError::Invalid);
    };
    let payload_bytes = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| TokenError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| TokenError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| TokenError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| TokenError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| TokenError::Invalid)?;
    let Some((id_part, exp_part)) = payload.split_once('|') else {
        return Err(TokenError::Invalid);
    };
    let session_id = Uuid::parse_str(id_part).map_err(|_| TokenError::Invalid)?;
    let exp: i64 = exp_part.parse().map_err(|_| TokenError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(TokenError::Expired);
    }
    Ok(SessionClaims { session_id, exp })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = auth.to_str() {
            if let Some(bearer) = value.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(header::COOKIE) {
        if let Ok(value) = cookie.to_str() {
            for pair in value.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

fn secure_flag() -> &'static str {
    if std::env::var("PRODUCTION").is_ok() {
        "; Secure"
    } else {
        ""
    }
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/{}",
        secure_flag()
    )
}

pub fn clear_session_cookie() -> String {
    format!(
        "{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        secure_flag()
    )
}

/// Creates a session row for `user_id` and returns the Set-Cookie headers.
pub async fn establish(state: &SharedState, user_id: Uuid) -> Result<HeaderMap, ApiError> {
    let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    let session = state.storage.create_session(user_id, expires_at).await?;
    let token = sign_session(session.id, session.expires_at, &state.session_key)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to sign session: {err}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token)
            .parse()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("invalid session cookie value")))?,
    );
    Ok(headers)
}

/// Authenticated caller, resolved from the signed cookie and its session row.
pub struct UserSession {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

impl UserSession {
    pub async fn user(&self, state: &SharedState) -> Result<User, ApiError> {
        state
            .storage
            .find_user_by_id(self.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = SharedState::from_ref(state);

        let token =
            extract_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        let claims = verify_session(&token, &state.session_key).map_err(|err| {
            tracing::warn!("session token rejected: {err}");
            ApiError::unauthorized("Not logged in")
        })?;

        let session = state
            .storage
            .find_session(claims.session_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        if session.expires_at < Utc::now() {
            return Err(ApiError::unauthorized("Session expired"));
        }

        if state
            .storage
            .find_user_by_id(session.user_id)
            .await?
            .is_none()
        {
            return Err(ApiError::unauthorized("Not logged in"));
        }

        Ok(UserSession {
            user_id: session.user_id,
            session_id: session.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip() {
        let id = Uuid::new_v4();
        let exp = Utc::now() + Duration::hours(1);
        let token = sign_session(id, exp, KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.session_id, id);
        assert_eq!(claims.exp, exp.timestamp());
    }

    #[test]
    fn tampering_is_rejected() {
        let token = sign_session(Uuid::new_v4(), Utc::now() + Duration::hours(1), KEY).unwrap();
        let (payload, _) = token.split_once('.').unwrap();
        let other = sign_session(Uuid::new_v4(), Utc::now() + Duration::hours(1), KEY).unwrap();
        let (_, other_sig) = other.split_once('.').unwrap();
        let forged = format!("{payload}.{other_sig}");
        assert!(matches!(
            verify_session(&forged, KEY),
            Err(TokenError::Signature)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign_session(Uuid::new_v4(), Utc::now() + Duration::hours(1), KEY).unwrap();
        assert!(verify_session(&token, b"another-key-entirely-32-bytes!!!").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_session(Uuid::new_v4(), Utc::now() - Duration::hours(1), KEY).unwrap();
        assert!(matches!(
            verify_session(&token, KEY),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_session("not-a-token", KEY).is_err());
        assert!(verify_session("a.b", KEY).is_err());
        assert!(verify_session("", KEY).is_err());
    }

    #[test]
    fn token_is_read_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; session=tok123; other=1".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer tok456".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("tok456"));

        assert!(extract_token(&HeaderMap::new()).is_none());
    }
}
