use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::models::analytics::{
    ExpertAnalytics, ExpertDetail, ExpertFunnel, ExpertInterviewStats, ExpertRecords, FlatRecord,
    FunnelReport, FunnelTotals, InterviewRecordsReport, InterviewStatsReport,
    MemberInterviewStats, RecordEntry, StatusCounts, TeamAnalytics, TeamDetail, TeamFunnel,
    TeamInterviewStats, TeamRecords,
};
use crate::models::filters::{AnalyticsFilters, TaskQuery};
use crate::models::interview::{FunnelStage, InterviewTask, StageCounts, TaskSummary};
use crate::models::team::{Team, TeamDirectory};
use crate::services::cache::{report_ttl, CacheService};
use crate::services::reference::ReferenceService;
use crate::services::store::{ExpertRoundCount, InterviewStore, StoreError, MAX_LOOKUP, MAX_SCAN};
use crate::utils::logger::LOGGER;

const RECENT_TASKS: i64 = 25;
const FUNNEL_TOP_EXPERTS: usize = 20;

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn InterviewStore>,
    cache: Arc<CacheService>,
    reference: ReferenceService,
}

/// Highest Screening→1st conversion first, then interview volume.
fn funnel_order(a: (&StageCounts, &str), b: (&StageCounts, &str)) -> Ordering {
    let (a_stages, a_name) = a;
    let (b_stages, b_name) = b;
    b_stages
        .conversions()
        .screening_to_1st
        .total_cmp(&a_stages.conversions().screening_to_1st)
        .then_with(|| b_stages.interview_count().cmp(&a_stages.interview_count()))
        .then_with(|| a_name.cmp(b_name))
}

fn expert_row(expert: String, team: String, stages: StageCounts) -> ExpertFunnel {
    ExpertFunnel {
        rank: 0,
        expert,
        team,
        interview_count: stages.interview_count(),
        conversions: stages.conversions(),
        stages,
    }
}

/// Members of `team` that survive the expert filter.
fn effective_members<'a>(team: &'a Team, expert: Option<&str>) -> Vec<&'a String> {
    team.members
        .iter()
        .filter(|member| expert.map_or(true, |expert| member.eq_ignore_ascii_case(expert)))
        .collect()
}

/// Team rows aggregated from already-filtered expert rows, so experts removed
/// by a filter never contribute to a team total.
pub fn build_team_rows(
    experts: &[ExpertFunnel],
    directory: &TeamDirectory,
    filters: &AnalyticsFilters,
) -> Vec<TeamFunnel> {
    let mut by_expert: HashMap<String, StageCounts> = HashMap::new();
    for row in experts {
        by_expert
            .entry(row.expert.to_lowercase())
            .or_default()
            .merge(&row.stages);
    }

    let mut rows: Vec<TeamFunnel> = Vec::new();
    for team in directory.teams() {
        if filters.team.as_deref().map_or(false, |name| name != team.name) {
            continue;
        }
        let members = effective_members(team, filters.expert.as_deref());
        if members.is_empty() {
            continue;
        }

        let mut stages = StageCounts::default();
        let mut contributing = 0;
        for member in members {
            if let Some(counts) = by_expert.get(&member.to_lowercase()) {
                contributing += 1;
                stages.merge(counts);
            }
        }
        if contributing == 0 {
            continue;
        }

        rows.push(TeamFunnel {
            rank: 0,
            team: team.name.clone(),
            member_count: team.members.len(),
            active_member_count: contributing,
            interview_count: stages.interview_count(),
            conversions: stages.conversions(),
            stages,
        });
    }

    rows.sort_by(|a, b| funnel_order((&a.stages, a.team.as_str()), (&b.stages, b.team.as_str())));
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
    rows
}

/// Expert funnel rows from (expert, round) counts.
pub fn build_expert_rows(
    counts: Vec<ExpertRoundCount>,
    directory: &TeamDirectory,
    filters: &AnalyticsFilters,
) -> Vec<ExpertFunnel> {
    let mut per_expert: BTreeMap<String, StageCounts> = BTreeMap::new();
    for row in counts {
        let Some(stage) = row.round.as_deref().and_then(FunnelStage::from_round) else {
            continue;
        };
        per_expert.entry(row.expert).or_default().add(stage, row.count);
    }

    let mut rows: Vec<ExpertFunnel> = per_expert
        .into_iter()
        .filter_map(|(expert, stages)| {
            let team = directory.team_or_unmapped(&expert);
            if filters.team.as_deref().map_or(false, |name| name != team) {
                return None;
            }
            if filters
                .expert
                .as_deref()
                .map_or(false, |name| !name.eq_ignore_ascii_case(&expert))
            {
                return None;
            }
            Some(expert_row(expert, team, stages))
        })
        .collect();

    rows.sort_by(|a, b| {
        funnel_order(
            (&a.stages, a.expert.as_str()),
            (&b.stages, b.expert.as_str()),
        )
    });
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
    rows
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}

fn record_date(received: Option<&str>) -> String {
    match received {
        Some(received) if !received.is_empty() => received.chars().take(10).collect(),
        _ => "N/A".to_string(),
    }
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn InterviewStore>, cache: Arc<CacheService>) -> Self {
        let reference = ReferenceService::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            reference,
        }
    }

    async fn expert_rows(
        &self,
        filters: &AnalyticsFilters,
        directory: &TeamDirectory,
    ) -> Result<Vec<ExpertFunnel>, StoreError> {
        let start_time = Instant::now();
        let counts = self
            .store
            .expert_round_counts(&TaskQuery::completed_funnel(filters.window.clone()))
            .await?;
        let rows = build_expert_rows(counts, directory, filters);

        LOGGER.log_performance_metric(
            "expert_funnel_duration",
            start_time.elapsed().as_millis() as f64,
            [("experts".to_string(), rows.len().to_string())]
                .into_iter()
                .collect(),
        );
        Ok(rows)
    }

    /// Expert rows for the export and report paths, without detail views.
    pub async fn expert_funnel(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<Vec<ExpertFunnel>, StoreError> {
        Ok(self.experts(filters, None).await?.experts)
    }

    pub async fn team_funnel(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<Vec<TeamFunnel>, StoreError> {
        Ok(self.teams(filters, None).await?.teams)
    }

    pub async fn experts(
        &self,
        filters: &AnalyticsFilters,
        view_expert: Option<String>,
    ) -> Result<ExpertAnalytics, StoreError> {
        let key = filters
            .cache_key("analytics_experts")
            .param("view_expert", view_expert.as_deref());

        self.cache
            .get_or_compute(&key, report_ttl(), || async {
                let directory = self.reference.team_directory().await?;
                let experts = self.expert_rows(filters, &directory).await?;

                let detail = match view_expert.as_deref() {
                    Some(view) => self.expert_detail(filters, &directory, &experts, view).await?,
                    None => None,
                };

                Ok::<_, StoreError>(ExpertAnalytics {
                    total_experts: experts.len(),
                    experts,
                    detail,
                })
            })
            .await
    }

    async fn expert_detail(
        &self,
        filters: &AnalyticsFilters,
        directory: &TeamDirectory,
        experts: &[ExpertFunnel],
        view: &str,
    ) -> Result<Option<ExpertDetail>, StoreError> {
        let stats = match experts.iter().find(|row| row.expert == view) {
            Some(row) => Some(row.clone()),
            // the viewed expert may sit outside the current team filter
            None => {
                let unfiltered = AnalyticsFilters {
                    window: filters.window.clone(),
                    team: None,
                    expert: Some(view.to_string()),
                };
                self.expert_rows(&unfiltered, directory)
                    .await?
                    .into_iter()
                    .next()
            }
        };
        let Some(stats) = stats else {
            return Ok(None);
        };

        let query = TaskQuery::completed_funnel(filters.window.clone())
            .for_experts(vec![view.to_string()]);
        let (round_distribution, tasks) = tokio::try_join!(
            self.store.round_distribution(&query),
            self.store.find_tasks(&query, RECENT_TASKS),
        )?;

        Ok(Some(ExpertDetail {
            stats,
            round_distribution,
            recent_tasks: tasks.into_iter().map(TaskSummary::from).collect(),
        }))
    }

    pub async fn teams(
        &self,
        filters: &AnalyticsFilters,
        view_team: Option<String>,
    ) -> Result<TeamAnalytics, StoreError> {
        let key = filters
            .cache_key("analytics_teams")
            .param("view_team", view_team.as_deref());

        self.cache
            .get_or_compute(&key, report_ttl(), || async {
                let directory = self.reference.team_directory().await?;
                let experts = self.expert_rows(filters, &directory).await?;
                let teams = build_team_rows(&experts, &directory, filters);

                let mut detail = None;
                if let Some(view) = view_team.as_deref() {
                    if let Some(stats) = teams.iter().find(|row| row.team == view) {
                        let scoped = AnalyticsFilters {
                            team: Some(view.to_string()),
                            ..filters.clone()
                        };
                        let members = self
                            .expert_rows(&scoped, &directory)
                            .await?
                            .into_iter()
                            .filter(|row| {
                                directory
                                    .members(view)
                                    .map_or(false, |members| {
                                        members.iter().any(|m| m.eq_ignore_ascii_case(&row.expert))
                                    })
                            })
                            .collect();
                        detail = Some(TeamDetail {
                            stats: stats.clone(),
                            members,
                        });
                    }
                }

                Ok::<_, StoreError>(TeamAnalytics {
                    total_teams: teams.len(),
                    teams,
                    detail,
                })
            })
            .await
    }

    pub async fn funnel(&self, filters: &AnalyticsFilters) -> Result<FunnelReport, StoreError> {
        self.cache
            .get_or_compute(&filters.cache_key("analytics_funnel"), report_ttl(), || async {
                let directory = self.reference.team_directory().await?;
                let mut experts = self.expert_rows(filters, &directory).await?;
                let teams = build_team_rows(&experts, &directory, filters);

                let mut totals = StageCounts::default();
                for row in &experts {
                    totals.merge(&row.stages);
                }
                experts.truncate(FUNNEL_TOP_EXPERTS);

                Ok::<_, StoreError>(FunnelReport {
                    totals: FunnelTotals::from(totals),
                    top_experts: experts,
                    teams,
                })
            })
            .await
    }

    /// Completed / cancelled / rescheduled counts per team member. Members
    /// without any tasks report zeros.
    pub async fn interview_stats(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<InterviewStatsReport, StoreError> {
        self.cache
            .get_or_compute(&filters.cache_key("interview_stats"), report_ttl(), || async {
                let directory = self.reference.team_directory().await?;
                let rows = self
                    .store
                    .expert_status_counts(&TaskQuery::interview_volume(filters.window.clone()))
                    .await?;

                let mut by_expert: HashMap<String, StatusCounts> = HashMap::new();
                for row in rows {
                    by_expert
                        .entry(row.expert.to_lowercase())
                        .or_default()
                        .merge(&StatusCounts {
                            completed: row.completed,
                            cancelled: row.cancelled,
                            rescheduled: row.rescheduled,
                            total: row.total,
                        });
                }

                let mut teams = Vec::new();
                let mut experts = Vec::new();
                let mut overall = StatusCounts::default();

                for team in directory.teams() {
                    if filters.team.as_deref().map_or(false, |name| name != team.name) {
                        continue;
                    }
                    let members = effective_members(team, filters.expert.as_deref());
                    if members.is_empty() {
                        continue;
                    }

                    let mut team_counts = StatusCounts::default();
                    let mut member_stats = Vec::new();
                    for member in members {
                        let counts = by_expert
                            .get(&member.to_lowercase())
                            .copied()
                            .unwrap_or_default();
                        team_counts.merge(&counts);
                        member_stats.push(MemberInterviewStats {
                            expert: member.clone(),
                            counts,
                        });
                        experts.push(ExpertInterviewStats {
                            team: team.name.clone(),
                            expert: member.clone(),
                            counts,
                        });
                    }
                    member_stats.sort_by(|a, b| b.counts.total.cmp(&a.counts.total));
                    overall.merge(&team_counts);

                    teams.push(TeamInterviewStats {
                        team: team.name.clone(),
                        member_count: team.members.len(),
                        active_members: member_stats.iter().filter(|m| m.counts.total > 0).count(),
                        counts: team_counts,
                        members: member_stats,
                    });
                }

                teams.sort_by(|a, b| b.counts.total.cmp(&a.counts.total));
                experts.sort_by(|a, b| b.counts.total.cmp(&a.counts.total));

                Ok::<_, StoreError>(InterviewStatsReport {
                    teams,
                    experts,
                    overall,
                })
            })
            .await
    }

    /// Every completed interview for the filtered teams, flattened. Used by
    /// the records report and the CSV export.
    pub async fn record_rows(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<Vec<FlatRecord>, StoreError> {
        Ok(self.interview_records_uncapped(filters).await?.1)
    }

    async fn interview_records_uncapped(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<(Vec<TeamRecords>, Vec<FlatRecord>), StoreError> {
        let directory = self.reference.team_directory().await?;

        let selected: Vec<(&Team, Vec<&String>)> = directory
            .teams()
            .iter()
            .filter(|team| filters.team.as_deref().map_or(true, |name| name == team.name))
            .map(|team| (team, effective_members(team, filters.expert.as_deref())))
            .filter(|(_, members)| !members.is_empty())
            .collect();

        // assignedTo is matched exactly, so query both the roster casing and lowercase
        let mut all_members: Vec<String> = selected
            .iter()
            .flat_map(|(_, members)| members.iter())
            .flat_map(|member| [member.to_string(), member.to_lowercase()])
            .collect();
        all_members.sort();
        all_members.dedup();

        let tasks = if all_members.is_empty() {
            Vec::new()
        } else {
            let query = TaskQuery::completed_interviews(filters.window.clone())
                .for_experts(all_members);
            self.store.find_tasks(&query, MAX_SCAN).await?
        };

        let mut by_expert: HashMap<String, Vec<&InterviewTask>> = HashMap::new();
        for task in &tasks {
            if let Some(expert) = task.assigned_to.as_deref() {
                by_expert.entry(expert.to_lowercase()).or_default().push(task);
            }
        }

        let mut teams = Vec::new();
        let mut flat = Vec::new();
        for (team, members) in selected {
            let mut expert_list = Vec::new();
            let mut team_total = 0;

            for member in members {
                let tasks = by_expert
                    .get(&member.to_lowercase())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                team_total += tasks.len();

                let mut records = Vec::new();
                for task in tasks {
                    flat.push(FlatRecord {
                        team: team.name.clone(),
                        expert: member.clone(),
                        subject: or_na(task.subject.clone()),
                        candidate: or_na(task.candidate_name.clone()),
                        round: or_na(task.actual_round.clone()),
                        date: task.received_date_time.clone().unwrap_or_default(),
                    });
                    if records.len() < MAX_LOOKUP {
                        records.push(RecordEntry {
                            subject: or_na(task.subject.clone()),
                            candidate: or_na(task.candidate_name.clone()),
                            round: or_na(task.actual_round.clone()),
                            date: record_date(task.received_date_time.as_deref()),
                        });
                    }
                }

                expert_list.push(ExpertRecords {
                    expert: member.clone(),
                    count: tasks.len(),
                    records,
                });
            }
            expert_list.sort_by(|a, b| b.count.cmp(&a.count));

            teams.push(TeamRecords {
                team: team.name.clone(),
                total: team_total,
                member_count: team.members.len(),
                active_count: expert_list.iter().filter(|e| e.count > 0).count(),
                experts: expert_list,
            });
        }
        teams.sort_by(|a, b| b.total.cmp(&a.total));

        Ok((teams, flat))
    }

    pub async fn interview_records(
        &self,
        filters: &AnalyticsFilters,
    ) -> Result<InterviewRecordsReport, StoreError> {
        self.cache
            .get_or_compute(&filters.cache_key("interview_records"), report_ttl(), || async {
                let (teams, mut records) = self.interview_records_uncapped(filters).await?;
                let overall_total = teams.iter().map(|team| team.total).sum();
                let total_records = records.len();
                records.truncate(MAX_LOOKUP);

                Ok::<_, StoreError>(InterviewRecordsReport {
                    teams,
                    records,
                    overall_total,
                    total_records,
                })
            })
            .await
    }
}
