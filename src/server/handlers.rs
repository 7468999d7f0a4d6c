use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::settings;

use super::models::{OverlayRequest, OverlayResponse};
use super::overlay::render_request;
use super::state::ServerState;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState { settings });
    let app = Router::new()
        .route("/health", get(health))
        .route("/overlay", post(overlay))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

/// Failures are reported in the body with `success: false` so the extension
/// can keep the page usable.
async fn overlay(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<OverlayRequest>,
) -> Json<OverlayResponse> {
    let result = tokio::task::spawn_blocking(move || render_request(state.as_ref(), payload)).await;
    let response = match result {
        Ok(Ok(result)) => OverlayResponse {
            success: true,
            result: Some(result),
            error: None,
        },
        Ok(Err(err)) => {
            warn!("overlay request failed: {:#}", err);
            OverlayResponse {
                success: false,
                result: None,
                error: Some(format!("{:#}", err)),
            }
        }
        Err(err) => OverlayResponse {
            success: false,
            result: None,
            error: Some(format!("overlay task failed: {}", err)),
        },
    };
    Json(response)
}
