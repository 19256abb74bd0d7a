use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    handlers::query::ApiQuery,
    models::{dashboard::DashboardSummary, filters::CandidateQuery},
    services::dashboard::DashboardService,
    utils::errors::AppError,
    AppState,
};

pub async fn get_dashboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CandidateQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    query.validate()?;

    let service = DashboardService::new(state.store.clone(), state.cache.clone());
    Ok(Json(service.summary(&query).await?))
}
