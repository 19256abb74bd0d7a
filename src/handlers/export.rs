use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use validator::Validate;

use crate::{
    handlers::query::ApiQuery,
    models::filters::{AnalyticsFilters, ExportQuery},
    services::{
        analytics::AnalyticsService,
        export::{ExportFormat, ExportService, ExportType},
    },
    utils::{errors::AppError, logger::LOGGER},
    AppState,
};

/// CSV downloads as an attachment; JSON is wrapped in `{success, type, count, data}`.
pub async fn export(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, AppError> {
    query.validate()?;

    let kind = ExportType::parse(query.kind.as_deref())
        .ok_or_else(|| AppError::BadRequest("Invalid export type".to_string()))?;
    let format = ExportFormat::parse(query.format.as_deref())
        .ok_or_else(|| AppError::BadRequest("Invalid export format".to_string()))?;

    let service = ExportService::new(AnalyticsService::new(
        state.store.clone(),
        state.cache.clone(),
    ));
    let data = service
        .export(kind, &AnalyticsFilters::from(&query.filters))
        .await?;

    let mut metadata = HashMap::new();
    metadata.insert("type".to_string(), serde_json::json!(kind.as_str()));
    metadata.insert("rows".to_string(), serde_json::json!(data.len()));
    LOGGER.log_business_event("export_generated", metadata);

    match format {
        ExportFormat::Json => {
            let body = data
                .to_json()
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;
            Ok(Json(body).into_response())
        }
        ExportFormat::Csv => {
            let disposition = format!("attachment; filename=\"{}\"", data.file_name());
            Ok((
                [
                    (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                data.to_csv(),
            )
                .into_response())
        }
    }
}
