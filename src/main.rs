mod domain;
mod error;
mod middleware;
mod services;
mod state;
mod storage;
mod web;

use crate::middleware::RateLimiter;
use crate::services::mailer::HttpMailer;
use crate::services::video_analysis::AnalysisClient;
use crate::state::{AppState, SharedState};
use crate::storage::postgres::PgStorage;
use crate::web::oauth::GoogleOauth;
use base64::{engine::general_purpose, Engine as _};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL missing");
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        e
    })?;

    let session_key_b64 = std::env::var("SESSION_KEY").expect("SESSION_KEY missing");
    let session_key = general_purpose::STANDARD
        .decode(session_key_b64)
        .expect("SESSION_KEY must be base64");

    let mailer = Arc::new(HttpMailer::from_env()?);
    let analyzer = AnalysisClient::from_env();

    let google = GoogleOauth::from_env();
    if google.is_none() {
        tracing::warn!("Google OAuth is not configured; /api/auth/google is disabled");
    }

    let shared: SharedState = Arc::new(AppState {
        storage: Arc::new(PgStorage::new(pool)),
        mailer,
        analyzer,
        session_key,
        google,
        register_limiter: RateLimiter::new(5, 60),
        login_limiter: RateLimiter::new(5, 60),
    });

    let app = web::routes(shared)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("0.0.0.0:{port}")
    });
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
