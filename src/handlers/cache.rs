use axum::{extract::State, Json};

use crate::{services::cache::CacheStats, utils::errors::AppError, AppState};

/// Read-only: expired entries are reported, not purged.
pub async fn get_cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.cache.stats().await?))
}
