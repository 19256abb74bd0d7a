use serde::Serialize;
use serde_json::{json, Value};
use std::borrow::Cow;

use crate::models::analytics::{ExpertFunnel, ExpertInterviewStats, FlatRecord, TeamFunnel};
use crate::models::filters::AnalyticsFilters;
use crate::services::analytics::AnalyticsService;
use crate::services::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    Experts,
    Teams,
    InterviewStats,
    Records,
}

impl ExportType {
    /// `None` for unknown types; a missing type means `experts`.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim).unwrap_or("experts") {
            "" | "experts" => Some(ExportType::Experts),
            "teams" => Some(ExportType::Teams),
            "interview_stats" => Some(ExportType::InterviewStats),
            "records" => Some(ExportType::Records),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Experts => "experts",
            ExportType::Teams => "teams",
            ExportType::InterviewStats => "interview_stats",
            ExportType::Records => "records",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim).unwrap_or("csv") {
            "" | "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// A row that can be written as one CSV line.
pub trait CsvRecord {
    const HEADER: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

impl CsvRecord for ExpertFunnel {
    const HEADER: &'static [&'static str] = &[
        "Rank", "Expert", "Team", "Interviews", "Screening", "1st", "2nd", "3rd/Technical",
        "Final", "Screening->1st %", "1st->2nd %", "2nd->3rd %", "3rd->Final %",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.expert.clone(),
            self.team.clone(),
            self.interview_count.to_string(),
            self.stages.screening.to_string(),
            self.stages.first.to_string(),
            self.stages.second.to_string(),
            self.stages.third_tech.to_string(),
            self.stages.final_round.to_string(),
            self.conversions.screening_to_1st.to_string(),
            self.conversions.first_to_2nd.to_string(),
            self.conversions.second_to_3rd.to_string(),
            self.conversions.third_to_final.to_string(),
        ]
    }
}

impl CsvRecord for TeamFunnel {
    const HEADER: &'static [&'static str] = &[
        "Rank", "Team", "Members", "Active Members", "Interviews", "Screening", "1st", "2nd",
        "3rd/Technical", "Final", "Screening->1st %", "1st->2nd %", "2nd->3rd %", "3rd->Final %",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.team.clone(),
            self.member_count.to_string(),
            self.active_member_count.to_string(),
            self.interview_count.to_string(),
            self.stages.screening.to_string(),
            self.stages.first.to_string(),
            self.stages.second.to_string(),
            self.stages.third_tech.to_string(),
            self.stages.final_round.to_string(),
            self.conversions.screening_to_1st.to_string(),
            self.conversions.first_to_2nd.to_string(),
            self.conversions.second_to_3rd.to_string(),
            self.conversions.third_to_final.to_string(),
        ]
    }
}

impl CsvRecord for ExpertInterviewStats {
    const HEADER: &'static [&'static str] =
        &["Team", "Expert", "Completed", "Cancelled", "Rescheduled", "Total"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.team.clone(),
            self.expert.clone(),
            self.counts.completed.to_string(),
            self.counts.cancelled.to_string(),
            self.counts.rescheduled.to_string(),
            self.counts.total.to_string(),
        ]
    }
}

impl CsvRecord for FlatRecord {
    const HEADER: &'static [&'static str] =
        &["Team", "Expert", "Subject", "Candidate", "Round", "Date"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.team.clone(),
            self.expert.clone(),
            self.subject.clone(),
            self.candidate.clone(),
            self.round.clone(),
            self.date.clone(),
        ]
    }
}

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_line(out: &mut String, fields: impl IntoIterator<Item = impl AsRef<str>>) {
    let line: Vec<String> = fields
        .into_iter()
        .map(|field| escape_field(field.as_ref()).into_owned())
        .collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

pub fn to_csv<R: CsvRecord>(rows: &[R]) -> String {
    let mut out = String::new();
    write_line(&mut out, R::HEADER.iter());
    for row in rows {
        write_line(&mut out, row.fields());
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportData {
    Experts(Vec<ExpertFunnel>),
    Teams(Vec<TeamFunnel>),
    InterviewStats(Vec<ExpertInterviewStats>),
    Records(Vec<FlatRecord>),
}

fn envelope<T: Serialize>(kind: ExportType, rows: &[T]) -> Result<Value, serde_json::Error> {
    let data = serde_json::to_value(rows)?;
    Ok(json!({
        "success": true,
        "type": kind.as_str(),
        "count": rows.len(),
        "data": data,
    }))
}

impl ExportData {
    pub fn kind(&self) -> ExportType {
        match self {
            ExportData::Experts(_) => ExportType::Experts,
            ExportData::Teams(_) => ExportType::Teams,
            ExportData::InterviewStats(_) => ExportType::InterviewStats,
            ExportData::Records(_) => ExportType::Records,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExportData::Experts(rows) => rows.len(),
            ExportData::Teams(rows) => rows.len(),
            ExportData::InterviewStats(rows) => rows.len(),
            ExportData::Records(rows) => rows.len(),
        }
    }

    pub fn to_csv(&self) -> String {
        match self {
            ExportData::Experts(rows) => to_csv(rows),
            ExportData::Teams(rows) => to_csv(rows),
            ExportData::InterviewStats(rows) => to_csv(rows),
            ExportData::Records(rows) => to_csv(rows),
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let kind = self.kind();
        match self {
            ExportData::Experts(rows) => envelope(kind, rows),
            ExportData::Teams(rows) => envelope(kind, rows),
            ExportData::InterviewStats(rows) => envelope(kind, rows),
            ExportData::Records(rows) => envelope(kind, rows),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_export.csv", self.kind().as_str())
    }
}

#[derive(Clone)]
pub struct ExportService {
    analytics: AnalyticsService,
}

impl ExportService {
    pub fn new(analytics: AnalyticsService) -> Self {
        Self { analytics }
    }

    pub async fn export(
        &self,
        kind: ExportType,
        filters: &AnalyticsFilters,
    ) -> Result<ExportData, StoreError> {
        Ok(match kind {
            ExportType::Experts => {
                ExportData::Experts(self.analytics.expert_funnel(filters).await?)
            }
            ExportType::Teams => ExportData::Teams(self.analytics.team_funnel(filters).await?),
            ExportType::InterviewStats => {
                ExportData::InterviewStats(self.analytics.interview_stats(filters).await?.experts)
            }
            ExportType::Records => ExportData::Records(self.analytics.record_rows(filters).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::CacheService;
    use crate::services::memory::{task, team, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn fields_with_delimiters_are_quoted() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("Rao, Asha"), "\"Rao, Asha\"");
        assert_eq!(escape_field("the \"final\" round"), "\"the \"\"final\"\" round\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn parses_types_and_formats() {
        assert_eq!(ExportType::parse(None), Some(ExportType::Experts));
        assert_eq!(ExportType::parse(Some("interview_stats")), Some(ExportType::InterviewStats));
        assert_eq!(ExportType::parse(Some("payroll")), None);
        assert_eq!(ExportFormat::parse(Some("json")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse(Some("xlsx")), None);
    }

    fn service() -> ExportService {
        let store = Arc::new(MemoryStore::new(
            vec![],
            vec![
                task("Rao, Asha", "a@x.com", "1st Round", "Completed", "2025-12-01T09:00:00"),
                task("Ravi", "a@x.com", "Screening", "Completed", "2025-12-02T09:00:00"),
            ],
            vec![team("Team A", &["a@x.com"])],
        ));
        ExportService::new(AnalyticsService::new(store, Arc::new(CacheService::in_memory(20))))
    }

    #[tokio::test]
    async fn records_export_as_csv() {
        let data = service()
            .export(ExportType::Records, &AnalyticsFilters::default())
            .await
            .unwrap();
        let csv = data.to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Team,Expert,Subject,Candidate,Round,Date");
        assert_eq!(
            lines[1],
            "Team A,a@x.com,\"1st Round - Rao, Asha\",\"Rao, Asha\",1st Round,2025-12-01T09:00:00"
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(data.file_name(), "records_export.csv");
    }

    #[tokio::test]
    async fn json_export_wraps_rows() {
        let data = service()
            .export(ExportType::Experts, &AnalyticsFilters::default())
            .await
            .unwrap();
        let json = data.to_json().unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["type"], "experts");
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["expert"], "a@x.com");
        assert_eq!(json["data"][0]["screening_to_1st"], 100.0);
    }
}
