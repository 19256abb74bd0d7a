use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_REJECTED: &str = "rejected";

/// A `candidateDetails` document as stored upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "Candidate Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Technology", default)]
    pub technology: Option<String>,
    #[serde(rename = "workflowStatus", default)]
    pub workflow_status: Option<String>,
    #[serde(rename = "Branch", default)]
    pub branch: Option<String>,
    #[serde(rename = "Brand", default)]
    pub brand: Option<String>,
    #[serde(rename = "Recruiter", default)]
    pub recruiter: Option<String>,
    #[serde(rename = "Expert", default)]
    pub expert: Option<String>,
    #[serde(rename = "resumeUnderstandingStatus", default)]
    pub resume_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<bson::DateTime>,
    #[serde(default)]
    pub updated_at: Option<bson::DateTime>,
}

/// Document fields a candidate listing needs; everything else stays in the store.
pub const CANDIDATE_FIELDS: &[&str] = &[
    "Candidate Name",
    "Technology",
    "workflowStatus",
    "Branch",
    "Brand",
    "Recruiter",
    "Expert",
    "resumeUnderstandingStatus",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateField {
    Technology,
    Recruiter,
    WorkflowStatus,
    Branch,
    Brand,
    ResumeStatus,
    Expert,
}

impl CandidateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateField::Technology => "Technology",
            CandidateField::Recruiter => "Recruiter",
            CandidateField::WorkflowStatus => "workflowStatus",
            CandidateField::Branch => "Branch",
            CandidateField::Brand => "Brand",
            CandidateField::ResumeStatus => "resumeUnderstandingStatus",
            CandidateField::Expert => "Expert",
        }
    }

    pub fn value_of<'a>(&self, candidate: &'a Candidate) -> Option<&'a str> {
        let value = match self {
            CandidateField::Technology => &candidate.technology,
            CandidateField::Recruiter => &candidate.recruiter,
            CandidateField::WorkflowStatus => &candidate.workflow_status,
            CandidateField::Branch => &candidate.branch,
            CandidateField::Brand => &candidate.brand,
            CandidateField::ResumeStatus => &candidate.resume_status,
            CandidateField::Expert => &candidate.expert,
        };
        value.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateResponse {
    pub name: String,
    pub technology: Option<String>,
    pub workflow_status: Option<String>,
    pub branch: Option<String>,
    pub brand: Option<String>,
    pub recruiter: Option<String>,
    pub expert: Option<String>,
    pub resume_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        Self {
            name: candidate.name.unwrap_or_default(),
            technology: candidate.technology,
            workflow_status: candidate.workflow_status,
            branch: candidate.branch,
            brand: candidate.brand,
            recruiter: candidate.recruiter,
            expert: candidate.expert,
            resume_status: candidate.resume_status,
            created_at: candidate.created_at.map(|ts| ts.to_chrono()),
            updated_at: candidate.updated_at.map(|ts| ts.to_chrono()),
        }
    }
}

/// Raw facet output of one candidate listing request.
#[derive(Debug, Clone, Default)]
pub struct CandidatePage {
    pub total: u64,
    pub active: u64,
    pub scheduled: u64,
    pub rejected: u64,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CandidateListResponse {
    pub candidates: Vec<CandidateResponse>,
    pub total_count: u64,
    pub page: u64,
    pub per_page: u64,
    pub active_count: u64,
    pub scheduled_count: u64,
    pub rejected_count: u64,
}

/// A candidate with interview activity in the lookback window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveCandidate {
    #[serde(alias = "_id")]
    pub name: String,
    pub interview_count: u64,
    #[serde(default)]
    pub last_interview: Option<String>,
    #[serde(default)]
    pub experts: Vec<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub workflow_status: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateActivity {
    pub total: u64,
    pub candidates: Vec<ActiveCandidate>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActiveCandidatesResponse {
    pub min_interviews: u32,
    pub months: u32,
    pub total_matching: u64,
    pub candidates: Vec<ActiveCandidate>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FilterOptions {
    pub technologies: Vec<String>,
    pub recruiters: Vec<String>,
    pub workflow_statuses: Vec<String>,
    pub branches: Vec<String>,
    pub brands: Vec<String>,
    pub resume_statuses: Vec<String>,
    pub teams: Vec<String>,
    pub experts: Vec<String>,
}
