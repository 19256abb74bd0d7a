use axum::{extract::State, Json};
use serde::Serialize;
use validator::Validate;

use crate::{
    handlers::query::ApiQuery,
    models::{
        candidate::{
            ActiveCandidatesResponse, CandidateListResponse, CandidateResponse, FilterOptions,
        },
        filters::{ActiveCandidateFilters, ActiveCandidatesQuery, CandidateQuery, SearchQuery},
    },
    services::candidates::CandidateService,
    utils::errors::AppError,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub candidates: Vec<CandidateResponse>,
    pub count: usize,
}

fn service(state: &AppState) -> CandidateService {
    CandidateService::new(state.store.clone(), state.cache.clone())
}

pub async fn get_candidates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CandidateQuery>,
) -> Result<Json<CandidateListResponse>, AppError> {
    query.validate()?;
    Ok(Json(service(&state).list(&query).await?))
}

/// Limits are clamped, not rejected.
pub async fn get_active_candidates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ActiveCandidatesQuery>,
) -> Result<Json<ActiveCandidatesResponse>, AppError> {
    let filters = ActiveCandidateFilters::from(&query);
    Ok(Json(service(&state).active(filters).await?))
}

pub async fn search_candidates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    query.validate()?;

    let service = service(&state);
    let term = query.term();
    let candidates = service.search(term.as_deref()).await?;
    if let Some(term) = &term {
        service.log_search(term, candidates.len());
    }

    Ok(Json(SearchResponse {
        count: candidates.len(),
        candidates,
    }))
}

pub async fn get_filter_options(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CandidateQuery>,
) -> Result<Json<FilterOptions>, AppError> {
    query.validate()?;
    Ok(Json(service(&state).filter_options(&query.selected_teams()).await?))
}
