use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::models::dashboard::{DashboardSummary, ExpertVolume, FunnelSummary, InterviewTotals};
use crate::models::filters::{CandidateQuery, TaskQuery, TaskWindow};
use crate::models::interview::{FunnelStage, StageCounts, TaskStatus};
use crate::models::team::TeamDirectory;
use crate::services::cache::{report_ttl, CacheService};
use crate::services::reference::ReferenceService;
use crate::services::store::{Bucket, CandidateFacets, InterviewStore, StoreError, TaskFacets};
use crate::utils::logger::LOGGER;

const TOP_EXPERTS: usize = 10;
const RECENT_ACTIVITY_DAYS: i64 = 7;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn InterviewStore>,
    cache: Arc<CacheService>,
    reference: ReferenceService,
}

fn bucket_map(buckets: Vec<Bucket>) -> BTreeMap<String, u64> {
    let mut map = BTreeMap::new();
    for bucket in buckets {
        *map.entry(bucket.value).or_insert(0) += bucket.count;
    }
    map
}

/// Folds completed-per-round counts into funnel stages; unrecognised rounds
/// are dropped.
pub fn stage_counts(rounds: &[Bucket]) -> StageCounts {
    let mut counts = StageCounts::default();
    for bucket in rounds {
        if let Some(stage) = FunnelStage::from_round(&bucket.value) {
            counts.add(stage, bucket.count);
        }
    }
    counts
}

impl DashboardService {
    pub fn new(store: Arc<dyn InterviewStore>, cache: Arc<CacheService>) -> Self {
        let reference = ReferenceService::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            reference,
        }
    }

    pub async fn summary(&self, query: &CandidateQuery) -> Result<DashboardSummary, StoreError> {
        let directory = self.reference.team_directory().await?;
        let filters = query.to_filters(&directory);
        let key = filters.cache_key("dashboard");

        self.cache
            .get_or_compute(&key, report_ttl(), || async {
                let start_time = Instant::now();

                let mut task_query = TaskQuery::all_interviews(TaskWindow::from_bounds(
                    &query.start_date,
                    &query.end_date,
                ));
                if let Some(experts) = &filters.experts {
                    task_query = task_query.for_experts(experts.clone());
                }
                let recent_since = Utc::now() - Duration::days(RECENT_ACTIVITY_DAYS);

                let (candidates, tasks) = tokio::try_join!(
                    self.store.candidate_facets(&filters, recent_since),
                    self.store.task_facets(&task_query, TOP_EXPERTS),
                )?;

                LOGGER.log_performance_metric(
                    "dashboard_summary_duration",
                    start_time.elapsed().as_millis() as f64,
                    HashMap::new(),
                );

                Ok::<_, StoreError>(build_summary(candidates, tasks, &directory))
            })
            .await
    }
}

fn build_summary(
    candidates: CandidateFacets,
    tasks: TaskFacets,
    directory: &TeamDirectory,
) -> DashboardSummary {
    let mut by_status: BTreeMap<String, u64> = TaskStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for (status, count) in bucket_map(tasks.by_status) {
        *by_status.entry(status).or_insert(0) += count;
    }

    let top_experts = tasks
        .top_experts
        .into_iter()
        .map(|bucket| ExpertVolume {
            team: directory.team_or_unmapped(&bucket.value),
            expert: bucket.value,
            completed: bucket.count,
        })
        .collect();

    DashboardSummary {
        total: candidates.total,
        status: bucket_map(candidates.by_status),
        technology: bucket_map(candidates.by_technology),
        branch: bucket_map(candidates.by_branch),
        recent_activity: candidates.recent_activity,
        interviews: InterviewTotals {
            total: tasks.total,
            by_status,
        },
        top_experts,
        funnel: FunnelSummary::from(stage_counts(&tasks.completed_by_round)),
    }
}
