use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    handlers::query::ApiQuery,
    models::{
        analytics::{
            ExpertAnalytics, FunnelReport, InterviewRecordsReport, InterviewStatsReport,
            TeamAnalytics,
        },
        filters::{AnalyticsFilters, AnalyticsQuery},
    },
    services::analytics::AnalyticsService,
    utils::errors::AppError,
    AppState,
};

fn service(state: &AppState) -> AnalyticsService {
    AnalyticsService::new(state.store.clone(), state.cache.clone())
}

pub async fn get_expert_analytics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<ExpertAnalytics>, AppError> {
    query.validate()?;
    let filters = AnalyticsFilters::from(&query);
    Ok(Json(service(&state).experts(&filters, query.view_expert()).await?))
}

pub async fn get_team_analytics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<TeamAnalytics>, AppError> {
    query.validate()?;
    let filters = AnalyticsFilters::from(&query);
    Ok(Json(service(&state).teams(&filters, query.view_team()).await?))
}

pub async fn get_funnel(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<FunnelReport>, AppError> {
    query.validate()?;
    Ok(Json(service(&state).funnel(&AnalyticsFilters::from(&query)).await?))
}

pub async fn get_interview_stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<InterviewStatsReport>, AppError> {
    query.validate()?;
    Ok(Json(
        service(&state)
            .interview_stats(&AnalyticsFilters::from(&query))
            .await?,
    ))
}

pub async fn get_interview_records(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<InterviewRecordsReport>, AppError> {
    query.validate()?;
    Ok(Json(
        service(&state)
            .interview_records(&AnalyticsFilters::from(&query))
            .await?,
    ))
}
