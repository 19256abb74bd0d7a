use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::candidate::{
    ActiveCandidatesResponse, CandidateField, CandidateListResponse, CandidateResponse,
    FilterOptions,
};
use crate::models::filters::{
    ActiveCandidateFilters, CandidateQuery, TaskQuery, TaskWindow, CANDIDATES_PER_PAGE,
};
use crate::services::cache::{reference_ttl, report_ttl, CacheKey, CacheService};
use crate::services::reference::ReferenceService;
use crate::services::store::{InterviewStore, StoreError, MAX_LISTING, MAX_LOOKUP};
use crate::utils::logger::LOGGER;

pub const SEARCH_LIMIT: usize = 50;

#[derive(Clone)]
pub struct CandidateService {
    store: Arc<dyn InterviewStore>,
    cache: Arc<CacheService>,
    reference: ReferenceService,
}

impl CandidateService {
    pub fn new(store: Arc<dyn InterviewStore>, cache: Arc<CacheService>) -> Self {
        let reference = ReferenceService::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            reference,
        }
    }

    /// Candidates with at least `min_interviews` completed interviews in the
    /// lookback window.
    pub async fn active(
        &self,
        filters: ActiveCandidateFilters,
    ) -> Result<ActiveCandidatesResponse, StoreError> {
        self.cache
            .get_or_compute(&filters.cache_key(), report_ttl(), || async {
                let window = TaskWindow::since(filters.window_start(Utc::now()));
                let activity = self
                    .store
                    .candidate_activity(
                        &TaskQuery::completed_funnel(window),
                        filters.min_interviews,
                        MAX_LISTING,
                        MAX_LOOKUP,
                    )
                    .await?;

                let mut candidates = activity.candidates;
                candidates.truncate(MAX_LISTING);
                let mut suggestions = activity.suggestions;
                suggestions.truncate(MAX_LOOKUP);

                LOGGER.log_business_event(
                    "active_candidates_computed",
                    [
                        ("total_matching".to_string(), serde_json::json!(activity.total)),
                        ("months".to_string(), serde_json::json!(filters.months)),
                    ]
                    .into_iter()
                    .collect(),
                );

                Ok::<_, StoreError>(ActiveCandidatesResponse {
                    min_interviews: filters.min_interviews,
                    months: filters.months,
                    total_matching: activity.total,
                    candidates,
                    suggestions,
                })
            })
            .await
    }

    pub async fn list(&self, query: &CandidateQuery) -> Result<CandidateListResponse, StoreError> {
        let directory = self.reference.team_directory().await?;
        let filters = query.to_filters(&directory);
        let page = query.page();
        let skip = (page - 1).saturating_mul(CANDIDATES_PER_PAGE);

        let result = self
            .store
            .candidate_page(&filters, skip, CANDIDATES_PER_PAGE)
            .await?;

        Ok(CandidateListResponse {
            candidates: result
                .candidates
                .into_iter()
                .map(CandidateResponse::from)
                .collect(),
            total_count: result.total,
            page,
            per_page: CANDIDATES_PER_PAGE,
            active_count: result.active,
            scheduled_count: result.scheduled,
            rejected_count: result.rejected,
        })
    }

    /// An empty term returns nothing without touching the store.
    pub async fn search(&self, term: Option<&str>) -> Result<Vec<CandidateResponse>, StoreError> {
        let Some(term) = term.map(str::trim).filter(|term| !term.is_empty()) else {
            return Ok(Vec::new());
        };

        let found = self.store.search_candidates(term, SEARCH_LIMIT).await?;
        Ok(found.into_iter().map(CandidateResponse::from).collect())
    }

    /// Dropdown values for the candidate grid. Experts are scoped to the
    /// selected teams when any of them has members.
    pub async fn filter_options(
        &self,
        selected_teams: &[String],
    ) -> Result<FilterOptions, StoreError> {
        let key = CacheKey::new("filter_options").param(
            "team",
            (!selected_teams.is_empty()).then(|| selected_teams.join(",")),
        );

        self.cache
            .get_or_compute(&key, reference_ttl(), || async {
                let directory = self.reference.team_directory().await?;

                let mut team_members: Vec<String> = selected_teams
                    .iter()
                    .filter_map(|team| directory.members(team))
                    .flatten()
                    .cloned()
                    .collect();
                team_members.sort();
                team_members.dedup();
                team_members.truncate(MAX_LOOKUP);

                let (
                    technologies,
                    recruiters,
                    workflow_statuses,
                    branches,
                    brands,
                    resume_statuses,
                ) = tokio::try_join!(
                    self.store.candidate_distinct(CandidateField::Technology, MAX_LOOKUP),
                    self.store.candidate_distinct(CandidateField::Recruiter, MAX_LOOKUP),
                    self.store.candidate_distinct(CandidateField::WorkflowStatus, MAX_LOOKUP),
                    self.store.candidate_distinct(CandidateField::Branch, MAX_LOOKUP),
                    self.store.candidate_distinct(CandidateField::Brand, MAX_LOOKUP),
                    self.store.candidate_distinct(CandidateField::ResumeStatus, MAX_LOOKUP),
                )?;

                let experts = if team_members.is_empty() {
                    self.store
                        .candidate_distinct(CandidateField::Expert, MAX_LOOKUP)
                        .await?
                } else {
                    team_members
                };

                Ok::<_, StoreError>(FilterOptions {
                    technologies,
                    recruiters,
                    workflow_statuses,
                    branches,
                    brands,
                    resume_statuses,
                    teams: directory.names(),
                    experts,
                })
            })
            .await
    }

    pub fn log_search(&self, term: &str, results: usize) {
        let mut metadata = HashMap::new();
        metadata.insert("term_length".to_string(), serde_json::json!(term.len()));
        metadata.insert("results".to_string(), serde_json::json!(results));
        LOGGER.log_business_event("candidate_search", metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filters::ActiveCandidatesQuery;
    use crate::services::memory::{candidate, task, team, MemoryStore};
    use chrono::Duration;

    fn recent(days_ago: i64) -> String {
        (Utc::now() - Duration::days(days_ago))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }

    fn service(store: MemoryStore) -> (Arc<MemoryStore>, CandidateService) {
        let store = Arc::new(store);
        let service = CandidateService::new(store.clone(), Arc::new(CacheService::in_memory(50)));
        (store, service)
    }

    #[tokio::test]
    async fn active_listing_is_capped_at_200() {
        let tasks = (0..10_000)
            .map(|i| {
                task(
                    &format!("Candidate {:05}", i),
                    "a@x.com",
                    "1st Round",
                    "Completed",
                    &recent(3),
                )
            })
            .collect();
        let (_, service) = service(MemoryStore::new(vec![], tasks, vec![]));

        let filters = ActiveCandidateFilters::from(&ActiveCandidatesQuery::default());
        let response = service.active(filters).await.unwrap();

        assert_eq!(response.candidates.len(), 200);
        assert_eq!(response.suggestions.len(), 500);
        assert_eq!(response.total_matching, 10_000);
    }

    #[tokio::test]
    async fn active_candidates_respect_threshold_and_window() {
        let (_, service) = service(MemoryStore::new(
            vec![candidate("Asha Rao", "active")],
            vec![
                task("Asha Rao", "a@x.com", "1st Round", "Completed", &recent(5)),
                task("Asha Rao", "b@x.com", "2nd Round", "Completed", &recent(2)),
                task("Ravi Kumar", "a@x.com", "1st Round", "Completed", &recent(4)),
                task("Ravi Kumar", "a@x.com", "2nd Round", "Completed", &recent(200)),
                task("Meera Iyer", "a@x.com", "1st Round", "Scheduled", &recent(1)),
            ],
            vec![],
        ));

        let response = service
            .active(ActiveCandidateFilters {
                min_interviews: 2,
                months: 3,
            })
            .await
            .unwrap();

        assert_eq!(response.total_matching, 1);
        let asha = &response.candidates[0];
        assert_eq!(asha.name, "Asha Rao");
        assert_eq!(asha.interview_count, 2);
        assert_eq!(asha.experts, vec!["a@x.com", "b@x.com"]);
        assert_eq!(asha.workflow_status.as_deref(), Some("active"));
        assert_eq!(response.suggestions, vec!["Asha Rao"]);
    }

    #[tokio::test]
    async fn listing_paginates_and_counts_statuses() {
        let candidates = (0..60)
            .map(|i| {
                let status = if i % 3 == 0 { "rejected" } else { "active" };
                candidate(&format!("Candidate {}", i), status)
            })
            .collect();
        let (_, service) = service(MemoryStore::new(candidates, vec![], vec![]));

        let query = CandidateQuery {
            page: Some(2),
            ..Default::default()
        };
        let response = service.list(&query).await.unwrap();

        assert_eq!(response.total_count, 60);
        assert_eq!(response.candidates.len(), 10);
        assert_eq!(response.page, 2);
        assert_eq!(response.rejected_count, 20);
        assert_eq!(response.active_count, 40);
        assert_eq!(response.scheduled_count, 0);
    }

    #[tokio::test]
    async fn huge_page_numbers_are_clamped() {
        let (_, service) = service(MemoryStore::new(
            vec![candidate("Asha Rao", "active")],
            vec![],
            vec![],
        ));

        let query = CandidateQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        let response = service.list(&query).await.unwrap();

        assert_eq!(response.page, 1000);
        assert_eq!(response.total_count, 1);
        assert!(response.candidates.is_empty());
    }

    #[tokio::test]
    async fn team_without_members_selects_no_candidates() {
        let mut asha = candidate("Asha Rao", "active");
        asha.expert = Some("a@x.com".into());
        let (_, service) = service(MemoryStore::new(
            vec![asha],
            vec![],
            vec![team("Team A", &["a@x.com"]), team("Team Empty", &[])],
        ));

        let by_team = CandidateQuery {
            team: Some("Team A".into()),
            ..Default::default()
        };
        assert_eq!(service.list(&by_team).await.unwrap().total_count, 1);

        let empty_team = CandidateQuery {
            team: Some("Team Empty".into()),
            ..Default::default()
        };
        assert_eq!(service.list(&empty_team).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_skips_blank_terms() {
        let (store, service) = service(MemoryStore::new(
            vec![candidate("Asha Rao", "active"), candidate("Ravi Kumar", "active")],
            vec![],
            vec![],
        ));

        let found = service.search(Some("asha")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Asha Rao");

        let calls = store.calls();
        assert!(service.search(Some("   ")).await.unwrap().is_empty());
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test]
    async fn filter_options_scope_experts_to_selected_teams() {
        let mut asha = candidate("Asha Rao", "active");
        asha.technology = Some("Java".into());
        asha.expert = Some("z@x.com".into());
        let (_, service) = service(MemoryStore::new(
            vec![asha],
            vec![],
            vec![team("Team A", &["b@x.com", "a@x.com"])],
        ));

        let all = service.filter_options(&[]).await.unwrap();
        assert_eq!(all.technologies, vec!["Java"]);
        assert_eq!(all.experts, vec!["z@x.com"]);
        assert_eq!(all.teams, vec!["Team A"]);

        let scoped = service.filter_options(&["Team A".to_string()]).await.unwrap();
        assert_eq!(scoped.experts, vec!["a@x.com", "b@x.com"]);
    }
}
