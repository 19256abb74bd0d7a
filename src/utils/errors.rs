use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::services::cache::CacheError;
use crate::services::store::StoreError;
use crate::utils::logger::LOGGER;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<HashMap<String, Vec<String>>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub enum AppError {
    ValidationError(HashMap<String, Vec<String>>),
    BadRequest(String),
    DatabaseUnavailable(String),
    InternalServerError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message, details) = match self {
            AppError::ValidationError(errors) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(errors),
            ),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::DatabaseUnavailable(msg) => ("DATABASE_UNAVAILABLE", msg, None),
            AppError::InternalServerError(msg) => ("INTERNAL_SERVER_ERROR", msg, None),
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
            timestamp: Utc::now(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("Invalid value for field '{}'", field))
                })
                .collect();
            error_map.insert(field.to_string(), messages);
        }

        AppError::ValidationError(error_map)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        let mut context = HashMap::new();
        context.insert(
            "error_type".to_string(),
            serde_json::Value::String(error.kind().to_string()),
        );
        LOGGER.log_error(&error.to_string(), context);

        match error {
            StoreError::Connection(msg) => AppError::DatabaseUnavailable(msg),
            StoreError::Query(_) | StoreError::Decode(_) => {
                AppError::InternalServerError("Database error occurred".to_string())
            }
        }
    }
}

impl From<CacheError> for AppError {
    fn from(error: CacheError) -> Self {
        LOGGER.log_error(&error.to_string(), HashMap::new());
        AppError::InternalServerError("Cache unavailable".to_string())
    }
}
