use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    handlers::query::ApiQuery,
    models::{
        filters::{KpiFilters, KpiQuery},
        kpi::{KpiReport, MatchedCandidatesQuery, MatchedCandidatesReport},
    },
    services::kpi::KpiService,
    utils::errors::AppError,
    AppState,
};

pub async fn get_kpi(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KpiQuery>,
) -> Result<Json<KpiReport>, AppError> {
    query.validate()?;

    let service = KpiService::new(state.store.clone(), state.cache.clone());
    Ok(Json(service.report(&KpiFilters::from(&query)).await?))
}

pub async fn get_matched_candidates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MatchedCandidatesQuery>,
) -> Result<Json<MatchedCandidatesReport>, AppError> {
    query.validate()?;

    let filters = KpiFilters::from(&query);
    let Some(expert) = filters.expert.as_deref() else {
        return Err(AppError::BadRequest("Expert email required".to_string()));
    };

    let service = KpiService::new(state.store.clone(), state.cache.clone());
    Ok(Json(
        service
            .matched_candidates(expert, &filters.task_query())
            .await?,
    ))
}
