use crate::config::RestConfig;
use crate::gateway::{Gateway, Target};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use netscope_core::{Fault, Transport};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// `X-API-KEY`, the header carrying the caller's credential.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug)]
struct RestState {
    gateway: Gateway,
    docs_path: String,
}

/// Docs and health routes, with every other path resolved as a capability.
pub fn router(gateway: Gateway, config: &RestConfig) -> Router {
    let docs_path = if config.docs_path.starts_with('/') {
        config.docs_path.clone()
    } else {
        format!("/{}", config.docs_path)
    };
    let state = Arc::new(RestState {
        gateway,
        docs_path: docs_path.clone(),
    });

    Router::new()
        .route(&docs_path, get(handle_docs))
        .route("/health", get(handle_health))
        .fallback(handle_invoke)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tracing::instrument(skip(state, headers, body), fields(body_len = body.len()))]
async fn handle_invoke(
    State(state): State<Arc<RestState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let credential = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let payload = match std::str::from_utf8(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(path = %uri.path(), error = %e, "Rejecting request body that is not UTF-8");
            return fault_response(&Fault::coercion_failed(format!(
                "Invalid arguments: request body is not valid UTF-8 ({})",
                e
            )));
        }
    };

    match state
        .gateway
        .handle(
            Transport::Rest,
            Target::Path(uri.path()),
            credential,
            Some(payload),
        )
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            result,
        )
            .into_response(),
        Err(fault) => fault_response(&fault),
    }
}

async fn handle_docs(State(state): State<Arc<RestState>>) -> Response {
    match state.gateway.docs(Transport::Rest) {
        Ok(docs) => Json(docs).into_response(),
        Err(fault) => fault_response(&fault),
    }
}

async fn handle_health(State(state): State<Arc<RestState>>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.gateway.capability_count() {
        Ok(count) => Json(json!({
            "status": "healthy",
            "capabilities": count,
            "endpoints": {
                "docs": state.docs_path,
                "health": "/health",
            },
            "timestamp": timestamp,
        }))
        .into_response(),
        Err(fault) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": fault.message,
                "timestamp": timestamp,
            })),
        )
            .into_response(),
    }
}

fn fault_response(fault: &Fault) -> Response {
    let status =
        StatusCode::from_u16(fault.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
        format!("Error: {}", fault.message)
    } else {
        fault.message.clone()
    };
    (status, body).into_response()
}
