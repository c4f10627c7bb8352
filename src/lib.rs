//! Portfolio Site - library for app logic and testing

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod payment;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::SiteConfig;
use gateway::SiteGateway;
use model::{Certification, Experience, Project, Service, Skill, UserRole};
use session::SessionStore;
use state::{AppState, SharedState};

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev frontend.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: SharedState) -> Router {
    let cors = configure_cors();

    Router::new()
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .route("/api/content", get(routes::content::list_sections))
        .route(
            "/api/content/{section}",
            get(routes::content::get_section).put(routes::content::update_section),
        )
        .route("/api/skills/grouped", get(routes::collections::grouped_skills))
        .merge(routes::collections::routes::<Project>("/api/projects"))
        .merge(routes::collections::routes::<Service>("/api/services"))
        .merge(routes::collections::routes::<Skill>("/api/skills"))
        .merge(routes::collections::routes::<Certification>("/api/certifications"))
        .merge(routes::collections::routes::<Experience>("/api/experiences"))
        .merge(routes::collections::routes::<UserRole>("/api/user-roles"))
        .merge(routes::messages::routes())
        .merge(routes::auth::routes())
        .merge(routes::upload::routes())
        .merge(routes::checkout::routes())
        .merge(routes::notifications::routes())
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global request body cap; uploads get their own limit on top
        .layer(RequestBodyLimitLayer::new(store::upload::MAX_FILE_SIZE + 1024 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = SiteConfig::default();
    tracing::info!(
        policy = %config.write_policy,
        local_only = ?config.local_only_sections,
        "Configuration loaded"
    );

    let gateway = Arc::new(SiteGateway::from_config(&config.gateway)?);
    let sessions = Arc::new(SessionStore::open(config.session_file.clone()).await);
    let state = AppState::new(gateway, sessions, &config).shared();

    // Serve right away; /health/ready reports when the first load is done.
    let loader = Arc::clone(&state);
    tokio::spawn(async move { loader.store.load().await });

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
