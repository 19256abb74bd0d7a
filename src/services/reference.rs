use std::sync::Arc;

use crate::models::filters::{TaskQuery, TaskWindow};
use crate::models::interview::TaskStatus;
use crate::models::team::{Team, TeamDirectory};
use crate::services::cache::{reference_ttl, CacheKey, CacheService};
use crate::services::store::{InterviewStore, StoreError, MAX_LOOKUP};

/// Slow-changing lookups shared by every report: the team roster and the list
/// of experts with completed interviews.
#[derive(Clone)]
pub struct ReferenceService {
    store: Arc<dyn InterviewStore>,
    cache: Arc<CacheService>,
}

impl ReferenceService {
    pub fn new(store: Arc<dyn InterviewStore>, cache: Arc<CacheService>) -> Self {
        Self { store, cache }
    }

    pub async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        self.cache
            .get_or_compute(&CacheKey::new("teams"), reference_ttl(), || async {
                self.store.teams().await
            })
            .await
    }

    pub async fn team_directory(&self) -> Result<TeamDirectory, StoreError> {
        Ok(TeamDirectory::new(self.teams().await?))
    }

    pub async fn active_experts(&self) -> Result<Vec<String>, StoreError> {
        self.cache
            .get_or_compute(&CacheKey::new("active_experts"), reference_ttl(), || async {
                let query = TaskQuery {
                    window: TaskWindow::default(),
                    statuses: vec![TaskStatus::Completed.as_str().to_string()],
                    ..Default::default()
                };
                self.store.distinct_experts(&query, MAX_LOOKUP).await
            })
            .await
    }
}
