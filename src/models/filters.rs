//! Filter configuration accepted at the HTTP boundary.
//!
//! Every recognised query option is a field here. Query structs are validated
//! (malformed dates and oversized strings are rejected) and numeric options are
//! clamped before anything reaches the query layer.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::models::interview::{TaskStatus, NON_INTERVIEW_ROUNDS, ON_DEMAND_ROUNDS};
use crate::models::team::TeamDirectory;
use crate::services::cache::CacheKey;

pub const DEFAULT_MIN_INTERVIEWS: u32 = 1;
pub const MAX_MIN_INTERVIEWS: i64 = 1000;
pub const DEFAULT_MONTHS: u32 = 3;
pub const MAX_MONTHS: i64 = 60;
pub const CANDIDATES_PER_PAGE: u64 = 50;
/// Deepest page the candidate grid serves; `MAX_SCAN / CANDIDATES_PER_PAGE`.
pub const MAX_PAGE: i64 = 1_000;

pub fn validate_iso_date(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || parse_date_bound(value, false).is_some() {
        Ok(())
    } else {
        let mut error = ValidationError::new("iso_date");
        error.message =
            Some("Expected an ISO-8601 date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)".into());
        Err(error)
    }
}

/// Parses a user supplied bound. Date-only values are widened to the start or
/// end of that day.
fn parse_date_bound(value: &str, end_of_day: bool) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)?
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)?
        };
        return Some(date.and_time(time));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.naive_utc())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Splits a comma separated multi-select into a sorted, de-duplicated list so
/// equivalent selections normalise to the same value.
pub fn split_list(value: &Option<String>) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    items.sort();
    items.dedup();
    items
}

/// Inclusive bounds on `receivedDateTime`, kept as ISO strings because that is
/// how task documents store the timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TaskWindow {
    pub fn from_bounds(start: &Option<String>, end: &Option<String>) -> Self {
        let format = |value: NaiveDateTime| value.format("%Y-%m-%dT%H:%M:%S").to_string();
        Self {
            start: non_empty(start)
                .and_then(|value| parse_date_bound(&value, false))
                .map(format),
            end: non_empty(end)
                .and_then(|value| parse_date_bound(&value, true))
                .map(format),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            end: None,
        }
    }

    pub fn contains(&self, received: Option<&str>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(received) = received else {
            return false;
        };
        let after_start = self.start.as_deref().map_or(true, |start| received >= start);
        let before_end = self.end.as_deref().map_or(true, |end| received <= end);
        after_start && before_end
    }
}

/// Describes which task documents a report reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub window: TaskWindow,
    pub statuses: Vec<String>,
    pub round: Option<String>,
    pub excluded_rounds: Vec<String>,
    pub experts: Option<Vec<String>>,
}

impl TaskQuery {
    fn excluding(window: TaskWindow, rounds: &[&str]) -> Self {
        Self {
            window,
            excluded_rounds: rounds.iter().map(|round| round.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Completed, assigned, non on-demand tasks: the funnel input set.
    pub fn completed_funnel(window: TaskWindow) -> Self {
        Self {
            statuses: vec![TaskStatus::Completed.as_str().to_string()],
            ..Self::excluding(window, ON_DEMAND_ROUNDS)
        }
    }

    /// All statuses, Screening and on-demand excluded: the status count input set.
    pub fn interview_volume(window: TaskWindow) -> Self {
        Self::excluding(window, NON_INTERVIEW_ROUNDS)
    }

    /// Completed interviews, Screening and on-demand excluded.
    pub fn completed_interviews(window: TaskWindow) -> Self {
        Self {
            statuses: vec![TaskStatus::Completed.as_str().to_string()],
            ..Self::excluding(window, NON_INTERVIEW_ROUNDS)
        }
    }

    /// Any status, on-demand excluded: the dashboard input set.
    pub fn all_interviews(window: TaskWindow) -> Self {
        Self::excluding(window, ON_DEMAND_ROUNDS)
    }

    pub fn for_experts(mut self, experts: Vec<String>) -> Self {
        self.experts = Some(experts);
        self
    }

    /// True when a selected round is also excluded; such a query matches nothing.
    pub fn is_contradictory(&self) -> bool {
        self.round
            .as_ref()
            .map_or(false, |round| self.excluded_rounds.contains(round))
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct AnalyticsQuery {
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
    #[validate(length(max = 256))]
    pub team: Option<String>,
    #[validate(length(max = 256))]
    pub expert: Option<String>,
    #[validate(length(max = 256))]
    pub view_expert: Option<String>,
    #[validate(length(max = 256))]
    pub view_team: Option<String>,
}

/// Normalised analytics filters shared by the expert, team, funnel, interview
/// and export reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsFilters {
    pub window: TaskWindow,
    pub team: Option<String>,
    pub expert: Option<String>,
}

impl AnalyticsFilters {
    pub fn cache_key(&self, route: &'static str) -> CacheKey {
        CacheKey::new(route)
            .param("start", self.window.start.as_deref())
            .param("end", self.window.end.as_deref())
            .param("team", self.team.as_deref())
            .param("expert", self.expert.as_deref())
    }
}

impl From<&AnalyticsQuery> for AnalyticsFilters {
    fn from(query: &AnalyticsQuery) -> Self {
        Self {
            window: TaskWindow::from_bounds(&query.start_date, &query.end_date),
            team: non_empty(&query.team),
            expert: non_empty(&query.expert),
        }
    }
}

impl AnalyticsQuery {
    pub fn view_expert(&self) -> Option<String> {
        non_empty(&self.view_expert)
    }

    pub fn view_team(&self) -> Option<String> {
        non_empty(&self.view_team)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ActiveCandidatesQuery {
    pub min_interviews: Option<i64>,
    pub months: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCandidateFilters {
    pub min_interviews: u32,
    pub months: u32,
}

impl From<&ActiveCandidatesQuery> for ActiveCandidateFilters {
    /// Out-of-range values are clamped rather than rejected.
    fn from(query: &ActiveCandidatesQuery) -> Self {
        Self {
            min_interviews: query
                .min_interviews
                .map(|value| value.clamp(0, MAX_MIN_INTERVIEWS) as u32)
                .unwrap_or(DEFAULT_MIN_INTERVIEWS),
            months: query
                .months
                .map(|value| value.clamp(1, MAX_MONTHS) as u32)
                .unwrap_or(DEFAULT_MONTHS),
        }
    }
}

impl ActiveCandidateFilters {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new("active_candidates")
            .param("min_interviews", Some(self.min_interviews))
            .param("months", Some(self.months))
    }

    /// Lookback start, using 30-day months.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(30 * self.months as i64)
    }
}

/// Candidate grid and dashboard filters. Multi-selects are comma separated.
#[derive(Debug, Deserialize, Validate, Default)]
pub struct CandidateQuery {
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
    #[validate(length(max = 256))]
    pub team: Option<String>,
    #[validate(length(max = 256))]
    pub technology: Option<String>,
    #[validate(length(max = 256))]
    pub recruiter: Option<String>,
    #[validate(length(max = 256))]
    pub status: Option<String>,
    #[validate(length(max = 256))]
    pub expert: Option<String>,
    #[validate(length(max = 256))]
    pub branch: Option<String>,
    #[validate(length(max = 256))]
    pub brand: Option<String>,
    #[validate(length(max = 256))]
    pub resume_status: Option<String>,
    pub page: Option<i64>,
}

/// Candidate filters after team expansion. `experts == Some(vec![])` matches
/// nothing: a selected team without members selects no candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFilters {
    pub updated_from: Option<DateTime<Utc>>,
    pub updated_to: Option<DateTime<Utc>>,
    pub technologies: Vec<String>,
    pub recruiters: Vec<String>,
    pub statuses: Vec<String>,
    pub branches: Vec<String>,
    pub brands: Vec<String>,
    pub resume_statuses: Vec<String>,
    pub teams: Vec<String>,
    pub experts: Option<Vec<String>>,
}

impl CandidateQuery {
    pub fn page(&self) -> u64 {
        self.page.map(|page| page.clamp(1, MAX_PAGE) as u64).unwrap_or(1)
    }

    pub fn selected_teams(&self) -> Vec<String> {
        split_list(&self.team)
    }

    /// Explicit experts win over team expansion.
    pub fn to_filters(&self, directory: &TeamDirectory) -> CandidateFilters {
        let to_utc = |value: NaiveDateTime| Utc.from_utc_datetime(&value);
        let teams = split_list(&self.team);
        let selected_experts = split_list(&self.expert);

        let experts = if !selected_experts.is_empty() {
            Some(selected_experts)
        } else if !teams.is_empty() {
            let mut members: Vec<String> = teams
                .iter()
                .filter_map(|team| directory.members(team))
                .flatten()
                .cloned()
                .collect();
            members.sort();
            members.dedup();
            Some(members)
        } else {
            None
        };

        CandidateFilters {
            updated_from: non_empty(&self.start_date)
                .and_then(|value| parse_date_bound(&value, false))
                .map(to_utc),
            updated_to: non_empty(&self.end_date)
                .and_then(|value| parse_date_bound(&value, true))
                .map(to_utc),
            technologies: split_list(&self.technology),
            recruiters: split_list(&self.recruiter),
            statuses: split_list(&self.status),
            branches: split_list(&self.branch),
            brands: split_list(&self.brand),
            resume_statuses: split_list(&self.resume_status),
            teams,
            experts,
        }
    }
}

impl CandidateFilters {
    pub fn cache_key(&self, route: &'static str) -> CacheKey {
        let joined = |items: &[String]| (!items.is_empty()).then(|| items.join(","));
        CacheKey::new(route)
            .param("updated_from", self.updated_from.map(|ts| ts.to_rfc3339()))
            .param("updated_to", self.updated_to.map(|ts| ts.to_rfc3339()))
            .param("technology", joined(&self.technologies))
            .param("recruiter", joined(&self.recruiters))
            .param("status", joined(&self.statuses))
            .param("branch", joined(&self.branches))
            .param("brand", joined(&self.brands))
            .param("resume_status", joined(&self.resume_statuses))
            .param("team", joined(&self.teams))
            .param("expert", self.experts.as_ref().map(|experts| experts.join(",")))
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct SearchQuery {
    #[validate(length(max = 100))]
    pub q: Option<String>,
}

impl SearchQuery {
    pub fn term(&self) -> Option<String> {
        non_empty(&self.q)
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct ExportQuery {
    #[serde(rename = "type")]
    #[validate(length(max = 32))]
    pub kind: Option<String>,
    #[validate(length(max = 8))]
    pub format: Option<String>,
    #[serde(flatten)]
    #[validate]
    pub filters: AnalyticsQuery,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct KpiQuery {
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
    #[validate(length(max = 256))]
    pub team: Option<String>,
    #[validate(length(max = 256))]
    pub expert: Option<String>,
    #[validate(length(max = 256))]
    pub round: Option<String>,
    /// Comma separated round titles.
    #[validate(length(max = 2048))]
    pub exclude_rounds: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiFilters {
    pub window: TaskWindow,
    pub team: Option<String>,
    pub expert: Option<String>,
    pub round: Option<String>,
    pub exclude_rounds: Vec<String>,
}

impl From<&KpiQuery> for KpiFilters {
    fn from(query: &KpiQuery) -> Self {
        Self {
            window: TaskWindow::from_bounds(&query.start_date, &query.end_date),
            team: non_empty(&query.team),
            expert: non_empty(&query.expert).map(|expert| expert.to_lowercase()),
            round: non_empty(&query.round),
            exclude_rounds: split_list(&query.exclude_rounds),
        }
    }
}

impl KpiFilters {
    pub fn task_query(&self) -> TaskQuery {
        TaskQuery {
            window: self.window.clone(),
            statuses: vec![TaskStatus::Completed.as_str().to_string()],
            round: self.round.clone(),
            excluded_rounds: self.exclude_rounds.clone(),
            experts: None,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new("kpi")
            .param("start", self.window.start.as_deref())
            .param("end", self.window.end.as_deref())
            .param("team", self.team.as_deref())
            .param("expert", self.expert.as_deref())
            .param("round", self.round.as_deref())
            .param(
                "exclude_rounds",
                (!self.exclude_rounds.is_empty()).then(|| self.exclude_rounds.join(",")),
            )
    }
}
