use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::interview::{ConversionRates, StageCounts};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    pub total: u64,
    pub status: BTreeMap<String, u64>,
    pub technology: BTreeMap<String, u64>,
    pub branch: BTreeMap<String, u64>,
    /// Candidates updated in the last seven days.
    pub recent_activity: u64,
    pub interviews: InterviewTotals,
    pub top_experts: Vec<ExpertVolume>,
    pub funnel: FunnelSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InterviewTotals {
    pub total: u64,
    /// Always carries every known task status, zero when absent.
    pub by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpertVolume {
    pub expert: String,
    pub team: String,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FunnelSummary {
    pub stages: StageCounts,
    pub total_interviews: u64,
    pub conversions: ConversionRates,
}

impl From<StageCounts> for FunnelSummary {
    fn from(stages: StageCounts) -> Self {
        Self {
            total_interviews: stages.interview_count(),
            conversions: stages.conversions(),
            stages,
        }
    }
}
