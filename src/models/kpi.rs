use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::filters::{validate_iso_date, KpiFilters, KpiQuery};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertKpi {
    pub expert: String,
    pub team: String,
    pub total_candidates: usize,
    pub total_interviews: usize,
    /// Candidates that have a candidate record naming an expert.
    pub validated_candidates: usize,
    pub matched_candidates: usize,
    pub matched_interviews: usize,
    pub match_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KpiSummary {
    pub total_experts: usize,
    pub total_candidates: usize,
    pub total_interviews: usize,
    pub avg_match_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KpiReport {
    pub experts: Vec<ExpertKpi>,
    pub summary: KpiSummary,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct MatchedCandidatesQuery {
    #[validate(length(max = 256))]
    pub expert: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
    #[validate(length(max = 256))]
    pub round: Option<String>,
    #[validate(length(max = 2048))]
    pub exclude_rounds: Option<String>,
}

impl From<&MatchedCandidatesQuery> for KpiFilters {
    fn from(query: &MatchedCandidatesQuery) -> Self {
        KpiFilters::from(&KpiQuery {
            start_date: query.start_date.clone(),
            end_date: query.end_date.clone(),
            team: None,
            expert: query.expert.clone(),
            round: query.round.clone(),
            exclude_rounds: query.exclude_rounds.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateMatch {
    pub name: String,
    pub subjects: Vec<String>,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_expert: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedCandidatesReport {
    pub expert: String,
    pub matched: Vec<CandidateMatch>,
    pub unmatched: Vec<CandidateMatch>,
    pub total_matched: usize,
    pub total_unmatched: usize,
}
