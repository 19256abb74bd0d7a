mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    handlers::{analytics, cache, candidates, dashboard, export, health, kpi, reference},
    middleware::request_log::{request_log_middleware, REQUEST_ID_HEADER},
    services::{
        cache::CacheService,
        mongo::MongoStore,
        store::InterviewStore,
    },
    utils::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InterviewStore>,
    pub cache: Arc<CacheService>,
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, REQUEST_ID_HEADER.clone()]);

    Ok(if origin == "*" {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origin.parse::<HeaderValue>()?)
    })
}

pub fn app(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/candidates", get(candidates::get_candidates))
        .route("/candidates/active", get(candidates::get_active_candidates))
        .route("/candidates/search", get(candidates::search_candidates))
        .route("/candidates/filters", get(candidates::get_filter_options))
        .route("/analytics/experts", get(analytics::get_expert_analytics))
        .route("/analytics/teams", get(analytics::get_team_analytics))
        .route("/analytics/funnel", get(analytics::get_funnel))
        .route("/analytics/interview-stats", get(analytics::get_interview_stats))
        .route("/analytics/interview-records", get(analytics::get_interview_records))
        .route("/kpi", get(kpi::get_kpi))
        .route("/kpi/matched-candidates", get(kpi::get_matched_candidates))
        .route("/export", get(export::export))
        .route("/teams", get(reference::get_teams))
        .route("/experts", get(reference::get_experts))
        .route("/cache/stats", get(cache::get_cache_stats));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(axum::middleware::from_fn(request_log_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Purges expired cache entries every five minutes.
async fn start_cache_janitor(cache: Arc<CacheService>) -> anyhow::Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async("0 */5 * * * *", move |_uuid, _l| {
        let cache = cache.clone();
        Box::pin(async move {
            match cache.cleanup_expired().await {
                Ok(cleaned) => tracing::debug!("Cache janitor removed {} entries", cleaned),
                Err(e) => tracing::error!("Cache janitor failed: {}", e),
            }
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;

    tracing::info!("Cache janitor started - running every 5 minutes");
    Ok(sched)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = MongoStore::connect(&config).await?;
    if let Err(e) = store.ping().await {
        // the driver reconnects lazily, /health reports the outage
        tracing::warn!("MongoDB is not reachable at startup: {}", e);
    }

    let state = AppState {
        store: Arc::new(store),
        cache: Arc::new(CacheService::in_memory(config.cache_max_entries)),
    };

    let _janitor = start_cache_janitor(state.cache.clone()).await?;

    let app = app(state, cors_layer(&config.cors_allowed_origin)?);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
