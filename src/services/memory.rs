//! In-process `InterviewStore` used by the test suite. It evaluates the same
//! filter semantics as the aggregation pipelines over plain vectors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::candidate::{
    ActiveCandidate, Candidate, CandidateActivity, CandidateField, CandidatePage, STATUS_ACTIVE,
    STATUS_REJECTED, STATUS_SCHEDULED,
};
use crate::models::filters::{CandidateFilters, TaskQuery};
use crate::models::interview::{InterviewTask, TaskStatus};
use crate::models::team::Team;
use crate::services::pipelines::UNKNOWN;
use crate::services::store::{
    Bucket, CandidateFacets, ExpertRoundCount, ExpertStatusCount, InterviewStore, StoreError,
    TaskFacets, MAX_SCAN,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub candidates: Vec<Candidate>,
    pub tasks: Vec<InterviewTask>,
    pub teams: Vec<Team>,
    pub offline: bool,
    calls: AtomicUsize,
}

pub fn candidate(name: &str, status: &str) -> Candidate {
    Candidate {
        name: Some(name.to_string()),
        workflow_status: Some(status.to_string()),
        ..Default::default()
    }
}

pub fn task(
    candidate: &str,
    expert: &str,
    round: &str,
    status: &str,
    received: &str,
) -> InterviewTask {
    InterviewTask {
        candidate_name: Some(candidate.to_string()),
        assigned_to: Some(expert.to_string()),
        actual_round: Some(round.to_string()),
        status: Some(status.to_string()),
        subject: Some(format!("{} - {}", round, candidate)),
        received_date_time: Some(received.to_string()),
        replies: Vec::new(),
    }
}

pub fn team(name: &str, members: &[&str]) -> Team {
    Team {
        name: name.to_string(),
        members: members.iter().map(|member| member.to_string()).collect(),
    }
}

impl MemoryStore {
    pub fn new(candidates: Vec<Candidate>, tasks: Vec<InterviewTask>, teams: Vec<Team>) -> Self {
        Self {
            candidates,
            tasks,
            teams,
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    /// Number of store operations served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(StoreError::Connection(
                "Server selection timeout: No available servers".to_string(),
            ));
        }
        Ok(())
    }

    fn matching_tasks<'a>(
        &'a self,
        query: &'a TaskQuery,
    ) -> impl Iterator<Item = &'a InterviewTask> {
        self.tasks.iter().filter(move |task| task_matches(query, task))
    }

    fn matching_candidates<'a>(
        &'a self,
        filters: &'a CandidateFilters,
    ) -> impl Iterator<Item = &'a Candidate> {
        self.candidates
            .iter()
            .filter(move |candidate| candidate_matches(filters, candidate))
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |value| !value.is_empty())
}

fn task_matches(query: &TaskQuery, task: &InterviewTask) -> bool {
    if !query.statuses.is_empty()
        && !task
            .status
            .as_ref()
            .map_or(false, |status| query.statuses.contains(status))
    {
        return false;
    }

    let expert_ok = match &query.experts {
        Some(experts) => task
            .assigned_to
            .as_ref()
            .map_or(false, |expert| experts.contains(expert)),
        None => is_present(&task.assigned_to),
    };
    if !expert_ok {
        return false;
    }

    if query.is_contradictory() {
        return false;
    }
    if let Some(round) = &query.round {
        if task.actual_round.as_ref() != Some(round) {
            return false;
        }
    } else if task
        .actual_round
        .as_ref()
        .map_or(false, |round| query.excluded_rounds.contains(round))
    {
        return false;
    }

    query.window.contains(task.received_date_time.as_deref())
}

fn candidate_matches(filters: &CandidateFilters, candidate: &Candidate) -> bool {
    let updated = candidate.updated_at.map(|ts| ts.to_chrono());
    if let Some(from) = filters.updated_from {
        if !updated.map_or(false, |ts| ts >= from) {
            return false;
        }
    }
    if let Some(to) = filters.updated_to {
        if !updated.map_or(false, |ts| ts <= to) {
            return false;
        }
    }

    let selects = [
        (CandidateField::Technology, &filters.technologies),
        (CandidateField::Recruiter, &filters.recruiters),
        (CandidateField::WorkflowStatus, &filters.statuses),
        (CandidateField::Branch, &filters.branches),
        (CandidateField::Brand, &filters.brands),
        (CandidateField::ResumeStatus, &filters.resume_statuses),
    ];
    for (field, values) in selects {
        if !values.is_empty()
            && !field
                .value_of(candidate)
                .map_or(false, |value| values.iter().any(|v| v == value))
        {
            return false;
        }
    }

    match &filters.experts {
        Some(experts) => CandidateField::Expert
            .value_of(candidate)
            .map_or(false, |expert| experts.iter().any(|e| e == expert)),
        None => true,
    }
}

fn buckets<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<Bucket> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for value in values {
        let label = value
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(UNKNOWN);
        *counts.entry(label.to_string()).or_default() += 1;
    }
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(value, count)| Bucket::new(value, count))
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    buckets
}

fn is_completed(task: &InterviewTask) -> bool {
    task.status.as_deref() == Some(TaskStatus::Completed.as_str())
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.enter()
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        self.enter()?;
        Ok(self.teams.clone())
    }

    async fn candidate_facets(
        &self,
        filters: &CandidateFilters,
        recent_since: DateTime<Utc>,
    ) -> Result<CandidateFacets, StoreError> {
        self.enter()?;
        let matched: Vec<&Candidate> = self.matching_candidates(filters).collect();

        Ok(CandidateFacets {
            total: matched.len() as u64,
            by_status: buckets(matched.iter().map(|c| c.workflow_status.as_deref())),
            by_technology: buckets(matched.iter().map(|c| c.technology.as_deref())),
            by_branch: buckets(matched.iter().map(|c| c.branch.as_deref())),
            recent_activity: matched
                .iter()
                .filter(|c| c.updated_at.map_or(false, |ts| ts.to_chrono() >= recent_since))
                .count() as u64,
        })
    }

    async fn task_facets(&self, query: &TaskQuery, top_n: usize) -> Result<TaskFacets, StoreError> {
        self.enter()?;
        let matched: Vec<&InterviewTask> = self.matching_tasks(query).collect();
        let completed = || matched.iter().filter(|task| is_completed(task));

        let mut top_experts = buckets(completed().map(|task| task.assigned_to.as_deref()));
        top_experts.truncate(top_n);

        Ok(TaskFacets {
            total: matched.len() as u64,
            by_status: buckets(matched.iter().map(|task| task.status.as_deref())),
            completed_by_round: buckets(completed().map(|task| task.actual_round.as_deref())),
            top_experts,
        })
    }

    async fn candidate_page(
        &self,
        filters: &CandidateFilters,
        skip: u64,
        limit: u64,
    ) -> Result<CandidatePage, StoreError> {
        self.enter()?;
        let mut matched: Vec<&Candidate> = self.matching_candidates(filters).collect();
        let count_status = |status: &str| {
            matched
                .iter()
                .filter(|c| c.workflow_status.as_deref() == Some(status))
                .count() as u64
        };
        let (active, scheduled, rejected) = (
            count_status(STATUS_ACTIVE),
            count_status(STATUS_SCHEDULED),
            count_status(STATUS_REJECTED),
        );

        let total = matched.len() as u64;
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(CandidatePage {
            total,
            active,
            scheduled,
            rejected,
            candidates: matched
                .into_iter()
                .skip(skip as usize)
                .take(limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn search_candidates(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        self.enter()?;
        let needle = term.to_lowercase();
        let mut found: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| {
                c.name
                    .as_deref()
                    .map_or(false, |name| name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit);
        Ok(found)
    }

    async fn candidate_activity(
        &self,
        query: &TaskQuery,
        min_interviews: u32,
        list_cap: usize,
        suggestion_cap: usize,
    ) -> Result<CandidateActivity, StoreError> {
        self.enter()?;

        let mut grouped: BTreeMap<&str, (u64, Option<&str>, BTreeSet<&str>)> = BTreeMap::new();
        for task in self.matching_tasks(query) {
            let Some(name) = task.candidate_name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let entry = grouped.entry(name).or_default();
            entry.0 += 1;
            let received = task.received_date_time.as_deref();
            if received > entry.1 {
                entry.1 = received;
            }
            if let Some(expert) = task.assigned_to.as_deref() {
                entry.2.insert(expert);
            }
        }
        grouped.retain(|_, (count, _, _)| *count >= min_interviews as u64);

        let suggestions: Vec<String> = grouped
            .keys()
            .take(suggestion_cap)
            .map(|name| name.to_string())
            .collect();

        let mut ranked: Vec<_> = grouped.iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(b.0)));

        let candidates = ranked
            .into_iter()
            .take(list_cap)
            .map(|(name, (count, last, experts))| {
                let details = self
                    .candidates
                    .iter()
                    .find(|c| c.name.as_deref() == Some(*name));
                ActiveCandidate {
                    name: name.to_string(),
                    interview_count: *count,
                    last_interview: last.map(str::to_string),
                    experts: experts.iter().map(|e| e.to_string()).collect(),
                    technology: details.and_then(|d| d.technology.clone()),
                    workflow_status: details.and_then(|d| d.workflow_status.clone()),
                    branch: details.and_then(|d| d.branch.clone()),
                }
            })
            .collect();

        Ok(CandidateActivity {
            total: grouped.len() as u64,
            candidates,
            suggestions,
        })
    }

    async fn candidate_distinct(
        &self,
        field: CandidateField,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.enter()?;
        let values: BTreeSet<String> = self
            .candidates
            .iter()
            .filter_map(|c| field.value_of(c))
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(values.into_iter().take(limit).collect())
    }

    async fn expert_round_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertRoundCount>, StoreError> {
        self.enter()?;
        let mut counts: BTreeMap<(String, Option<String>), u64> = BTreeMap::new();
        for task in self.matching_tasks(query) {
            let Some(expert) = task.assigned_to.clone() else {
                continue;
            };
            *counts.entry((expert, task.actual_round.clone())).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((expert, round), count)| ExpertRoundCount { expert, round, count })
            .collect())
    }

    async fn expert_status_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertStatusCount>, StoreError> {
        self.enter()?;
        let mut rows: BTreeMap<String, ExpertStatusCount> = BTreeMap::new();
        for task in self.matching_tasks(query) {
            let Some(expert) = task.assigned_to.clone() else {
                continue;
            };
            let row = rows.entry(expert.clone()).or_insert_with(|| ExpertStatusCount {
                expert,
                ..Default::default()
            });
            match task.status.as_deref() {
                Some("Completed") => row.completed += 1,
                Some("Cancelled") => row.cancelled += 1,
                Some("Rescheduled") => row.rescheduled += 1,
                _ => {}
            }
            row.total += 1;
        }
        Ok(rows.into_values().collect())
    }

    async fn find_tasks(
        &self,
        query: &TaskQuery,
        limit: i64,
    ) -> Result<Vec<InterviewTask>, StoreError> {
        self.enter()?;
        let mut found: Vec<InterviewTask> = self.matching_tasks(query).cloned().collect();
        found.sort_by(|a, b| b.received_date_time.cmp(&a.received_date_time));
        found.truncate(limit.min(MAX_SCAN).max(0) as usize);
        Ok(found)
    }

    async fn round_distribution(&self, query: &TaskQuery) -> Result<Vec<Bucket>, StoreError> {
        self.enter()?;
        Ok(buckets(
            self.matching_tasks(query)
                .map(|task| task.actual_round.as_deref()),
        ))
    }

    async fn distinct_experts(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.enter()?;
        let experts: BTreeSet<String> = self
            .matching_tasks(query)
            .filter_map(|task| task.assigned_to.clone())
            .collect();
        Ok(experts.into_iter().take(limit).collect())
    }

    async fn candidate_experts(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        self.enter()?;
        Ok(self
            .candidates
            .iter()
            .filter_map(|c| {
                let name = c.name.as_ref().filter(|name| names.contains(name))?;
                let expert = c.expert.as_ref().filter(|expert| !expert.is_empty())?;
                Some((name.clone(), expert.to_lowercase()))
            })
            .collect())
    }
}
