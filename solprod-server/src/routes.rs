use axum::{
    extract::rejection::JsonRejection,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use solprod_shared::{ChatRequest, ChatResponse, HealthStatus, ServiceInfo};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::RelayError;
use crate::relay::ChatRelay;

pub fn build_router(relay: Arc<ChatRelay>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get({
            let relay = relay.clone();
            move || info(relay)
        }))
        .route("/api/health", get({
            let relay = relay.clone();
            move || health(relay)
        }))
        .route("/api/chat", post({
            let relay = relay.clone();
            move |req| chat(req, relay)
        }))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS restricted to `allowed_origins`; methods and headers are
/// mirrored from the preflight, which is how "any" is expressed alongside credentials.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Skipping invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(600))
}

async fn info(relay: Arc<ChatRelay>) -> Json<ServiceInfo> {
    Json(relay.info())
}

async fn health(relay: Arc<ChatRelay>) -> Json<HealthStatus> {
    Json(relay.health())
}

async fn chat(
    payload: Result<Json<ChatRequest>, JsonRejection>,
    relay: Arc<ChatRelay>,
) -> Result<Json<ChatResponse>, RelayError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected chat request: {}", rejection.body_text());
        RelayError::validation(rejection.body_text())
    })?;

    relay.handle_chat(request).await.map(Json).map_err(|e| {
        error!("Failed to relay chat ({}): {}", e.kind, e);
        e
    })
}
