use bson::Document;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "interview-insights";
const SLOW_AGGREGATION_MS: u128 = 1000;

#[derive(Debug)]
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_request(
        &self,
        method: &str,
        path: &str,
        request_id: &str,
        status: u16,
        duration_ms: u128,
    ) {
        let log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "http_request",
            "method": method,
            "path": path,
            "request_id": request_id,
            "status_code": status,
            "duration_ms": duration_ms,
            "service": SERVICE_NAME
        });

        if status >= 500 {
            warn!("{}", log_entry);
        } else {
            info!("{}", log_entry);
        }
    }

    /// Logs one aggregation round trip. The pipeline is identified by a hash of
    /// its canonical JSON so identical report shapes group together.
    pub fn log_aggregation(
        &self,
        collection: &str,
        pipeline: &[Document],
        duration_ms: u128,
        result_count: Option<usize>,
    ) {
        let rendered = serde_json::to_string(pipeline).unwrap_or_default();
        let stage_names: Vec<String> = pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().cloned())
            .collect();

        let log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "aggregation_query",
            "collection": collection,
            "pipeline_hash": format!("{:x}", md5::compute(rendered.as_bytes())),
            "stages": stage_names,
            "duration_ms": duration_ms,
            "result_count": result_count,
            "service": SERVICE_NAME
        });

        if duration_ms > SLOW_AGGREGATION_MS {
            warn!("Slow aggregation detected: {}", log_entry);
        } else {
            info!("{}", log_entry);
        }
    }

    pub fn log_error(&self, error: &str, context: HashMap<String, serde_json::Value>) {
        let mut log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "error",
            "error_message": error,
            "service": SERVICE_NAME
        });

        for (key, value) in context {
            log_entry[key] = value;
        }

        error!("{}", log_entry);
    }

    pub fn log_performance_metric(
        &self,
        metric_name: &str,
        value: f64,
        tags: HashMap<String, String>,
    ) {
        let log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "performance_metric",
            "metric_name": metric_name,
            "value": value,
            "tags": tags,
            "service": SERVICE_NAME
        });

        info!("{}", log_entry);
    }

    pub fn log_business_event(
        &self,
        event_name: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        let mut log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "business_event",
            "event_name": event_name,
            "service": SERVICE_NAME
        });

        for (key, value) in metadata {
            log_entry[key] = value;
        }

        info!("{}", log_entry);
    }
}

pub static LOGGER: StructuredLogger = StructuredLogger;
