use bson::Bson;
use serde::{Deserialize, Serialize};

/// Rounds that are not interviews at all and never enter a funnel.
pub const ON_DEMAND_ROUNDS: &[&str] = &["On demand", "On Demand or AI Interview"];

/// Rounds excluded from interview volume reports (status counts, records).
pub const NON_INTERVIEW_ROUNDS: &[&str] = &["Screening", "On demand", "On Demand or AI Interview"];

/// A `taskBody` document as stored upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterviewTask {
    #[serde(rename = "Candidate Name", default)]
    pub candidate_name: Option<String>,
    #[serde(rename = "assignedTo", default)]
    pub assigned_to: Option<String>,
    #[serde(rename = "actualRound", default)]
    pub actual_round: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "receivedDateTime", default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub replies: Vec<Bson>,
}

impl InterviewTask {
    /// Reply entries that are plain strings; other shapes are ignored.
    pub fn reply_texts(&self) -> impl Iterator<Item = &str> {
        self.replies.iter().filter_map(|reply| reply.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Scheduled,
    Completed,
    Cancelled,
    Rescheduled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Scheduled,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
        TaskStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "Scheduled",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Rescheduled => "Rescheduled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TaskSummary {
    pub candidate: String,
    pub round: String,
    pub status: String,
    pub subject: String,
    pub received_at: String,
}

impl From<InterviewTask> for TaskSummary {
    fn from(task: InterviewTask) -> Self {
        Self {
            candidate: task.candidate_name.unwrap_or_else(|| "N/A".to_string()),
            round: task.actual_round.unwrap_or_else(|| "N/A".to_string()),
            status: task.status.unwrap_or_default(),
            subject: task.subject.unwrap_or_else(|| "N/A".to_string()),
            received_at: task.received_date_time.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunnelStage {
    Screening,
    First,
    Second,
    ThirdTechnical,
    Final,
}

impl FunnelStage {
    /// Maps a free-text `actualRound` title onto a funnel stage.
    pub fn from_round(round: &str) -> Option<Self> {
        match round.trim().to_lowercase().as_str() {
            "screening" => Some(FunnelStage::Screening),
            "1st round" | "first round" => Some(FunnelStage::First),
            "2nd round" | "second round" => Some(FunnelStage::Second),
            "3rd round" | "third round" | "technical" | "technical round" => {
                Some(FunnelStage::ThirdTechnical)
            }
            "final" | "final round" | "loop round" => Some(FunnelStage::Final),
            _ => None,
        }
    }
}

/// Percentage rounded to one decimal; zero when there is nothing to divide by.
pub fn pct(num: u64, den: u64) -> f64 {
    if den == 0 {
        return 0.0;
    }
    ((num as f64 / den as f64) * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageCounts {
    pub screening: u64,
    pub first: u64,
    pub second: u64,
    pub third_tech: u64,
    #[serde(rename = "final")]
    pub final_round: u64,
}

impl StageCounts {
    pub fn add(&mut self, stage: FunnelStage, count: u64) {
        match stage {
            FunnelStage::Screening => self.screening += count,
            FunnelStage::First => self.first += count,
            FunnelStage::Second => self.second += count,
            FunnelStage::ThirdTechnical => self.third_tech += count,
            FunnelStage::Final => self.final_round += count,
        }
    }

    pub fn merge(&mut self, other: &StageCounts) {
        self.screening += other.screening;
        self.first += other.first;
        self.second += other.second;
        self.third_tech += other.third_tech;
        self.final_round += other.final_round;
    }

    /// Screening is a gate, not an interview.
    pub fn interview_count(&self) -> u64 {
        self.first + self.second + self.third_tech + self.final_round
    }

    pub fn conversions(&self) -> ConversionRates {
        ConversionRates {
            screening_to_1st: pct(self.first, self.screening),
            first_to_2nd: pct(self.second, self.first),
            second_to_3rd: pct(self.third_tech, self.second),
            third_to_final: pct(self.final_round, self.third_tech),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRates {
    pub screening_to_1st: f64,
    pub first_to_2nd: f64,
    pub second_to_3rd: f64,
    pub third_to_final: f64,
}
