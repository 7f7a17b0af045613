use crate::middleware::RateLimiter;
use crate::services::mailer::Mailer;
use crate::services::video_analysis::AnalysisClient;
use crate::storage::Storage;
use crate::web::oauth::GoogleOauth;
use std::sync::Arc;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub analyzer: AnalysisClient,
    pub session_key: Vec<u8>,
    pub google: Option<GoogleOauth>,
    pub register_limiter: RateLimiter,
    pub login_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;
