//! Verification-code generation and delivery.
//!
//! Delivery goes through an HTTP email API so the transport stays a plain
//! JSON POST. A failed send must surface to the caller: registration treats
//! an undelivered code as a failed registration, never as a verified user.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::time::Duration;

/// Uniformly random 6-digit decimal code; leading zeros are valid.
pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<()>;
}

pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            api_url,
            api_key,
            from,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("MAIL_API_URL").context("MAIL_API_URL missing")?;
        let api_key = std::env::var("MAIL_API_KEY").context("MAIL_API_KEY missing")?;
        let from = std::env::var("MAIL_FROM").context("MAIL_FROM missing")?;
        Ok(Self::new(api_url, api_key, from))
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        let body = json!({
            "from": self.from,
            "to": to,
            "subject": "Your Verification Code",
            "text": format!("Your verification code is: {code}"),
        });

        self.http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("email API unreachable")?
            .error_for_status()
            .context("email API rejected the message")?;

        tracing::info!("verification code sent to {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_vary() {
        let codes: HashSet<String> = (0..50).map(|_| generate_verification_code()).collect();
        assert!(codes.len() > 1);
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error() {
        let mailer = HttpMailer::new(
            "http://127.0.0.1:1/send".to_string(),
            "key".to_string(),
            "noreply@example.com".to_string(),
        );
        assert!(mailer
            .send_verification_code("a@x.com", "123456")
            .await
            .is_err());
    }
}
