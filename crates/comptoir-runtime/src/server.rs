//! HTTP surface: liveness probe and the update endpoint.
//!
//! `GET /` and `GET /health` answer the hosting platform's health check and
//! touch no application state. `POST /update` is where the command-dispatch
//! side hands over gauge updates.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use comptoir_core::error::{ComptoirError, Result};
use serde::Serialize;

use crate::coordinator::{UpdateAck, UpdateCoordinator, UpdateRequest};

/// Body of the liveness response.
pub const LIVENESS_BODY: &str = "Comptoir is alive";

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError(ComptoirError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

async fn liveness_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, LIVENESS_BODY)
}

async fn update_handler(
    State(coordinator): State<Arc<UpdateCoordinator>>,
    Json(request): Json<UpdateRequest>,
) -> std::result::Result<Json<UpdateAck>, ApiError> {
    coordinator.apply(request).await.map(Json).map_err(ApiError)
}

/// Stateless health-check routes.
pub fn liveness_router() -> Router {
    Router::new()
        .route("/", get(liveness_handler))
        .route("/health", get(liveness_handler))
}

/// Liveness routes plus `POST /update` backed by `coordinator`.
pub fn router(coordinator: Arc<UpdateCoordinator>) -> Router {
    Router::new()
        .route("/update", post(update_handler))
        .with_state(coordinator)
        .merge(liveness_router())
}

/// Bind `addr` and serve `app` until the process stops.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ComptoirError::Config(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "HTTP listener ready");
    axum::serve(listener, app).await?;
    Ok(())
}
