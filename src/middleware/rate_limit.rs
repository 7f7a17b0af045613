//! Sliding-window rate limiter for credential endpoints. In-memory only;
//! a multi-instance deployment would move this to a shared store.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records an attempt for `identifier` and reports whether it is allowed.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        let history = attempts.entry(identifier.to_string()).or_default();
        history.retain(|at| now.duration_since(*at) < self.window);

        if history.len() < self.max_attempts {
            history.push(now);
            true
        } else {
            false
        }
    }
}

/// Best-effort client identity: first hop of X-Forwarded-For when a proxy
/// is in front, otherwise a shared bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
