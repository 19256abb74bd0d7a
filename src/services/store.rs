use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::candidate::{Candidate, CandidateActivity, CandidateField, CandidatePage};
use crate::models::filters::{CandidateFilters, TaskQuery};
use crate::models::interview::InterviewTask;
use crate::models::team::Team;

/// Absolute ceiling on documents pulled back by any single scan.
pub const MAX_SCAN: i64 = 50_000;
/// Autocomplete and lookup lists.
pub const MAX_LOOKUP: usize = 500;
/// Filtered candidate listings.
pub const MAX_LISTING: usize = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("database query failed: {0}")]
    Query(String),
    #[error("failed to decode database result: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "ConnectionFailure",
            StoreError::Query(_) => "QueryFailure",
            StoreError::Decode(_) => "DecodeFailure",
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *error.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::Authentication { .. }
            | ErrorKind::DnsResolve { .. } => StoreError::Connection(error.to_string()),
            ErrorKind::BsonDeserialization(_) => StoreError::Decode(error.to_string()),
            _ => StoreError::Query(error.to_string()),
        }
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(error: bson::de::Error) -> Self {
        StoreError::Decode(error.to_string())
    }
}

/// A grouped count; `value` is the group key rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub value: String,
    pub count: u64,
}

impl Bucket {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Sub-results of the candidate fan-out, all computed over one filtered input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFacets {
    pub total: u64,
    pub by_status: Vec<Bucket>,
    pub by_technology: Vec<Bucket>,
    pub by_branch: Vec<Bucket>,
    pub recent_activity: u64,
}

/// Sub-results of the task fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFacets {
    pub total: u64,
    pub by_status: Vec<Bucket>,
    pub completed_by_round: Vec<Bucket>,
    pub top_experts: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertRoundCount {
    pub expert: String,
    pub round: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertStatusCount {
    pub expert: String,
    pub completed: u64,
    pub cancelled: u64,
    pub rescheduled: u64,
    pub total: u64,
}

/// Read access to the recruitment collections.
///
/// Every report goes through this trait; `MongoStore` is the production
/// implementation.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn teams(&self) -> Result<Vec<Team>, StoreError>;

    async fn candidate_facets(
        &self,
        filters: &CandidateFilters,
        recent_since: DateTime<Utc>,
    ) -> Result<CandidateFacets, StoreError>;

    async fn task_facets(&self, query: &TaskQuery, top_n: usize) -> Result<TaskFacets, StoreError>;

    /// One page of candidates, newest update first, with status counters over
    /// the whole filtered set.
    async fn candidate_page(
        &self,
        filters: &CandidateFilters,
        skip: u64,
        limit: u64,
    ) -> Result<CandidatePage, StoreError>;

    /// Case-insensitive substring match on the candidate name.
    async fn search_candidates(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Candidates with at least `min_interviews` matching tasks.
    async fn candidate_activity(
        &self,
        query: &TaskQuery,
        min_interviews: u32,
        list_cap: usize,
        suggestion_cap: usize,
    ) -> Result<CandidateActivity, StoreError>;

    async fn candidate_distinct(
        &self,
        field: CandidateField,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Task counts grouped by (assignedTo, actualRound).
    async fn expert_round_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertRoundCount>, StoreError>;

    /// Completed / cancelled / rescheduled counts per assigned expert.
    async fn expert_status_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertStatusCount>, StoreError>;

    /// Matching tasks, newest first.
    async fn find_tasks(
        &self,
        query: &TaskQuery,
        limit: i64,
    ) -> Result<Vec<InterviewTask>, StoreError>;

    async fn round_distribution(&self, query: &TaskQuery) -> Result<Vec<Bucket>, StoreError>;

    async fn distinct_experts(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Candidate name → lower-cased expert, for candidates that have one.
    async fn candidate_experts(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, String>, StoreError>;
}
