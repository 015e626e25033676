pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::cache::CacheService;
use crate::config::Config;
use crate::services::BookingService;
use crate::store::RecordStore;

// Shared state для всего приложения
pub struct AppState<S> {
    pub store: S,
    pub bookings: BookingService<S>,
    pub cache: CacheService,
    pub config: Config,
}

impl<S: RecordStore> AppState<S> {
    pub fn new(store: S, cache: CacheService, config: Config) -> Arc<Self> {
        let bookings = BookingService::new(store.clone(), config.booking.clone());
        Arc::new(Self {
            store,
            bookings,
            cache,
            config,
        })
    }
}

/// Full HTTP application: `/`, `/health` and the API under `/api`.
pub fn app<S: RecordStore>(state: Arc<AppState<S>>) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(health::<S>))
        .nest("/api", controllers::routes::<S>())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health<S: RecordStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let cache = state.cache.health().await;
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "cache": cache })),
        ),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "cache": cache })),
            )
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .app
        .allowed_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
}
