use serde::{Deserialize, Serialize};

use crate::models::interview::{ConversionRates, StageCounts, TaskSummary};
use crate::services::store::Bucket;

/// Funnel counts for one expert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertFunnel {
    pub rank: usize,
    pub expert: String,
    pub team: String,
    pub interview_count: u64,
    #[serde(flatten)]
    pub stages: StageCounts,
    #[serde(flatten)]
    pub conversions: ConversionRates,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamFunnel {
    pub rank: usize,
    pub team: String,
    pub member_count: usize,
    /// Members that contributed data after filtering.
    pub active_member_count: usize,
    pub interview_count: u64,
    #[serde(flatten)]
    pub stages: StageCounts,
    #[serde(flatten)]
    pub conversions: ConversionRates,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertDetail {
    pub stats: ExpertFunnel,
    pub round_distribution: Vec<Bucket>,
    pub recent_tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertAnalytics {
    pub total_experts: usize,
    pub experts: Vec<ExpertFunnel>,
    pub detail: Option<ExpertDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamDetail {
    pub stats: TeamFunnel,
    pub members: Vec<ExpertFunnel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamAnalytics {
    pub total_teams: usize,
    pub teams: Vec<TeamFunnel>,
    pub detail: Option<TeamDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelTotals {
    #[serde(flatten)]
    pub stages: StageCounts,
    pub total_interviews: u64,
    #[serde(flatten)]
    pub conversions: ConversionRates,
}

impl From<StageCounts> for FunnelTotals {
    fn from(stages: StageCounts) -> Self {
        Self {
            total_interviews: stages.interview_count(),
            conversions: stages.conversions(),
            stages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelReport {
    pub totals: FunnelTotals,
    pub top_experts: Vec<ExpertFunnel>,
    pub teams: Vec<TeamFunnel>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct StatusCounts {
    pub completed: u64,
    pub cancelled: u64,
    pub rescheduled: u64,
    pub total: u64,
}

impl StatusCounts {
    pub fn merge(&mut self, other: &StatusCounts) {
        self.completed += other.completed;
        self.cancelled += other.cancelled;
        self.rescheduled += other.rescheduled;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberInterviewStats {
    pub expert: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamInterviewStats {
    pub team: String,
    pub member_count: usize,
    pub active_members: usize,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub members: Vec<MemberInterviewStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertInterviewStats {
    pub team: String,
    pub expert: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewStatsReport {
    pub teams: Vec<TeamInterviewStats>,
    pub experts: Vec<ExpertInterviewStats>,
    pub overall: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordEntry {
    pub subject: String,
    pub candidate: String,
    pub round: String,
    /// `YYYY-MM-DD`, or `N/A` when the task has no timestamp.
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertRecords {
    pub expert: String,
    pub count: usize,
    pub records: Vec<RecordEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamRecords {
    pub team: String,
    pub total: usize,
    pub member_count: usize,
    pub active_count: usize,
    pub experts: Vec<ExpertRecords>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatRecord {
    pub team: String,
    pub expert: String,
    pub subject: String,
    pub candidate: String,
    pub round: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewRecordsReport {
    pub teams: Vec<TeamRecords>,
    /// Flat listing, capped; `total_records` is the uncapped size.
    pub records: Vec<FlatRecord>,
    pub overall_total: usize,
    pub total_records: usize,
}
