use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    models::team::Team,
    services::reference::ReferenceService,
    utils::errors::AppError,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<Team>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExpertsResponse {
    pub experts: Vec<String>,
    pub count: usize,
}

pub async fn get_teams(State(state): State<AppState>) -> Result<Json<TeamsResponse>, AppError> {
    let teams = ReferenceService::new(state.store.clone(), state.cache.clone())
        .teams()
        .await?;
    Ok(Json(TeamsResponse {
        count: teams.len(),
        teams,
    }))
}

pub async fn get_experts(State(state): State<AppState>) -> Result<Json<ExpertsResponse>, AppError> {
    let experts = ReferenceService::new(state.store.clone(), state.cache.clone())
        .active_experts()
        .await?;
    Ok(Json(ExpertsResponse {
        count: experts.len(),
        experts,
    }))
}
