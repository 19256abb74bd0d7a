use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::models::filters::{KpiFilters, TaskQuery};
use crate::models::interview::{pct, InterviewTask};
use crate::models::kpi::{
    CandidateMatch, ExpertKpi, KpiReport, KpiSummary, MatchStatus, MatchedCandidatesReport,
};
use crate::services::cache::{report_ttl, CacheService};
use crate::services::reference::ReferenceService;
use crate::services::store::{InterviewStore, StoreError, MAX_SCAN};
use crate::utils::logger::LOGGER;

const MATCH_SCAN: i64 = 10_000;

const ASSIGNMENT_KEYWORDS: &[&str] = &["assigned to", "assigning to", "assigned:", "asigned"];

/// Subjects that are not real interviews for attribution purposes.
const EXCLUDED_SUBJECTS: &[&str] = &["on demand", "ondemand", "ai interview", "screening"];

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"[\w\.-]+@[\w\.-]+\.\w+").expect("email pattern");
}

fn first_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|found| found.as_str().to_lowercase())
}

/// The expert a task was first handed to: the first e-mail in the earliest
/// reply that records an assignment, then any e-mail in any reply, then
/// `assignedTo`. Always lowercase.
pub fn first_assigned_expert(task: &InterviewTask) -> Option<String> {
    let assignment = task.reply_texts().find_map(|reply| {
        let lower = reply.to_lowercase();
        if ASSIGNMENT_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            first_email(reply)
        } else {
            None
        }
    });

    assignment
        .or_else(|| task.reply_texts().find_map(first_email))
        .or_else(|| {
            task.assigned_to
                .as_deref()
                .map(str::trim)
                .filter(|expert| !expert.is_empty())
                .map(str::to_lowercase)
        })
}

fn is_excluded_subject(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    EXCLUDED_SUBJECTS.iter().any(|excluded| lower.contains(excluded))
}

#[derive(Default)]
struct Attribution {
    /// Candidate name per interview, in scan order.
    interviews: Vec<String>,
    candidates: BTreeSet<String>,
}

#[derive(Clone)]
pub struct KpiService {
    store: Arc<dyn InterviewStore>,
    cache: Arc<CacheService>,
    reference: ReferenceService,
}

impl KpiService {
    pub fn new(store: Arc<dyn InterviewStore>, cache: Arc<CacheService>) -> Self {
        let reference = ReferenceService::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            reference,
        }
    }

    pub async fn report(&self, filters: &KpiFilters) -> Result<KpiReport, StoreError> {
        self.cache
            .get_or_compute(&filters.cache_key(), report_ttl(), || async {
                let directory = self.reference.team_directory().await?;
                let tasks = self.store.find_tasks(&filters.task_query(), MAX_SCAN).await?;

                let mut by_expert: BTreeMap<String, Attribution> = BTreeMap::new();
                for task in &tasks {
                    let Some(expert) = first_assigned_expert(task) else {
                        continue;
                    };
                    let Some(team) = directory.team_of(&expert) else {
                        continue;
                    };
                    if filters.team.as_deref().map_or(false, |name| name != team) {
                        continue;
                    }
                    if filters.expert.as_deref().map_or(false, |name| name != expert) {
                        continue;
                    }

                    let name = task.candidate_name.clone().unwrap_or_default();
                    let entry = by_expert.entry(expert).or_default();
                    if !name.is_empty() {
                        entry.candidates.insert(name.clone());
                    }
                    entry.interviews.push(name);
                }

                let names: Vec<String> = by_expert
                    .values()
                    .flat_map(|attribution| attribution.candidates.iter().cloned())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let recorded = if names.is_empty() {
                    HashMap::new()
                } else {
                    self.store.candidate_experts(&names).await?
                };

                let mut experts = Vec::with_capacity(by_expert.len());
                let (mut total_matches, mut total_validated) = (0u64, 0u64);
                for (expert, attribution) in by_expert {
                    let mut validated = 0;
                    let mut matched = 0;
                    let mut matched_interviews = 0;
                    for candidate in &attribution.candidates {
                        let Some(owner) = recorded.get(candidate) else {
                            continue;
                        };
                        validated += 1;
                        if *owner == expert {
                            matched += 1;
                            matched_interviews += attribution
                                .interviews
                                .iter()
                                .filter(|name| *name == candidate)
                                .count();
                        }
                    }
                    total_matches += matched as u64;
                    total_validated += validated as u64;

                    experts.push(ExpertKpi {
                        team: directory.team_or_unmapped(&expert),
                        expert,
                        total_candidates: attribution.candidates.len(),
                        total_interviews: attribution.interviews.len(),
                        validated_candidates: validated,
                        matched_candidates: matched,
                        matched_interviews,
                        match_rate: pct(matched as u64, validated as u64),
                    });
                }
                experts.sort_by(|a, b| b.total_interviews.cmp(&a.total_interviews));

                let summary = KpiSummary {
                    total_experts: experts.len(),
                    total_candidates: experts.iter().map(|row| row.total_candidates).sum(),
                    total_interviews: experts.iter().map(|row| row.total_interviews).sum(),
                    avg_match_rate: pct(total_matches, total_validated),
                };

                LOGGER.log_business_event(
                    "kpi_computed",
                    [
                        ("tasks_scanned".to_string(), serde_json::json!(tasks.len())),
                        ("experts".to_string(), serde_json::json!(summary.total_experts)),
                    ]
                    .into_iter()
                    .collect(),
                );

                Ok::<_, StoreError>(KpiReport { experts, summary })
            })
            .await
    }

    /// Candidates first assigned to `expert`, split by whether their candidate
    /// record names the same expert. `expert` must already be lowercase.
    pub async fn matched_candidates(
        &self,
        expert: &str,
        query: &TaskQuery,
    ) -> Result<MatchedCandidatesReport, StoreError> {
        let tasks = self.store.find_tasks(query, MATCH_SCAN).await?;

        let mut order: Vec<CandidateMatch> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for task in &tasks {
            if first_assigned_expert(task).as_deref() != Some(expert) {
                continue;
            }
            let subject = task.subject.clone().unwrap_or_default();
            if is_excluded_subject(&subject) {
                continue;
            }
            let Some(name) = task.candidate_name.clone().filter(|name| !name.is_empty()) else {
                continue;
            };

            let slot = *index.entry(name.clone()).or_insert_with(|| {
                order.push(CandidateMatch {
                    name,
                    subjects: Vec::new(),
                    status: MatchStatus::NotFound,
                    actual_expert: None,
                });
                order.len() - 1
            });
            if !subject.is_empty() {
                order[slot].subjects.push(subject);
            }
        }

        let names: Vec<String> = order.iter().map(|candidate| candidate.name.clone()).collect();
        let recorded = if names.is_empty() {
            HashMap::new()
        } else {
            self.store.candidate_experts(&names).await?
        };

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for mut candidate in order {
            match recorded.get(&candidate.name) {
                Some(owner) if owner == expert => {
                    candidate.status = MatchStatus::Matched;
                    matched.push(candidate);
                }
                Some(owner) => {
                    candidate.status = MatchStatus::Unmatched;
                    candidate.actual_expert = Some(owner.clone());
                    unmatched.push(candidate);
                }
                None => unmatched.push(candidate),
            }
        }

        Ok(MatchedCandidatesReport {
            expert: expert.to_string(),
            total_matched: matched.len(),
            total_unmatched: unmatched.len(),
            matched,
            unmatched,
        })
    }
}
