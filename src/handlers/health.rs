use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::collections::HashMap;

use crate::{services::store::InterviewStore, utils::logger::LOGGER, AppState};

/// Liveness plus a store ping. Never cached.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
            })),
        ),
        Err(error) => {
            let mut context = HashMap::new();
            context.insert("error_type".to_string(), json!(error.kind()));
            LOGGER.log_error(&format!("health check failed: {}", error), context);

            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": error.to_string(),
                    "error_type": error.kind(),
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}
