//! Aggregation pipeline builders and result decoders.
//!
//! Builders are pure functions of the filter structs so the exact stages sent
//! to the server can be asserted on without a database. Each report is a
//! single `$match` followed by a `$facet` (or `$group`), so one report costs
//! one round trip.

use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};

use crate::models::candidate::{
    ActiveCandidate, Candidate, CandidateActivity, CandidatePage, CANDIDATE_FIELDS,
    STATUS_ACTIVE, STATUS_REJECTED, STATUS_SCHEDULED,
};
use crate::models::filters::{CandidateFilters, TaskQuery};
use crate::models::interview::TaskStatus;
use crate::services::store::{Bucket, CandidateFacets, ExpertRoundCount, StoreError, TaskFacets};

pub const CANDIDATES: &str = "candidateDetails";
pub const TASKS: &str = "taskBody";
pub const TEAMS: &str = "teams";

/// Group label for documents missing the grouped field.
pub const UNKNOWN: &str = "Unknown";

fn in_list(values: &[String]) -> Bson {
    if values.len() == 1 {
        Bson::String(values[0].clone())
    } else {
        Bson::Document(doc! { "$in": values.to_vec() })
    }
}

fn non_empty_string() -> Document {
    doc! { "$type": "string", "$ne": "" }
}

pub fn task_match(query: &TaskQuery) -> Document {
    let mut filter = Document::new();

    if !query.statuses.is_empty() {
        filter.insert("status", in_list(&query.statuses));
    }

    match &query.experts {
        Some(experts) => filter.insert("assignedTo", doc! { "$in": experts.clone() }),
        None => filter.insert("assignedTo", non_empty_string()),
    };

    if query.is_contradictory() {
        let nothing: Vec<String> = Vec::new();
        filter.insert("actualRound", doc! { "$in": nothing });
    } else if let Some(round) = &query.round {
        filter.insert("actualRound", round.as_str());
    } else if !query.excluded_rounds.is_empty() {
        filter.insert("actualRound", doc! { "$nin": query.excluded_rounds.clone() });
    }

    let mut received = Document::new();
    if let Some(start) = &query.window.start {
        received.insert("$gte", start.as_str());
    }
    if let Some(end) = &query.window.end {
        received.insert("$lte", end.as_str());
    }
    if !received.is_empty() {
        filter.insert("receivedDateTime", received);
    }

    filter
}

pub fn candidate_match(filters: &CandidateFilters) -> Document {
    let mut filter = Document::new();

    let mut updated = Document::new();
    if let Some(from) = filters.updated_from {
        updated.insert("$gte", bson::DateTime::from_chrono(from));
    }
    if let Some(to) = filters.updated_to {
        updated.insert("$lte", bson::DateTime::from_chrono(to));
    }
    if !updated.is_empty() {
        filter.insert("updated_at", updated);
    }

    let multi_selects = [
        ("Technology", &filters.technologies),
        ("Recruiter", &filters.recruiters),
        ("workflowStatus", &filters.statuses),
        ("Branch", &filters.branches),
        ("Brand", &filters.brands),
        ("resumeUnderstandingStatus", &filters.resume_statuses),
    ];
    for (field, values) in multi_selects {
        if !values.is_empty() {
            filter.insert(field, doc! { "$in": values.clone() });
        }
    }

    if let Some(experts) = &filters.experts {
        filter.insert("Expert", doc! { "$in": experts.clone() });
    }

    filter
}

pub fn candidate_projection() -> Document {
    let mut projection = doc! { "_id": 0 };
    for field in CANDIDATE_FIELDS {
        projection.insert(*field, 1);
    }
    projection
}

pub fn task_projection() -> Document {
    doc! {
        "_id": 0,
        "Candidate Name": 1,
        "assignedTo": 1,
        "actualRound": 1,
        "status": 1,
        "subject": 1,
        "receivedDateTime": 1,
        "replies": 1,
    }
}

fn count_stage() -> Vec<Document> {
    vec![doc! { "$count": "count" }]
}

fn group_count(field: &str) -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": format!("${}", field), "count": { "$sum": 1 } } },
        doc! { "$sort": { "count": -1, "_id": 1 } },
    ]
}

pub fn candidate_summary_pipeline(
    filters: &CandidateFilters,
    recent_since: DateTime<Utc>,
) -> Vec<Document> {
    vec![
        doc! { "$match": candidate_match(filters) },
        doc! {
            "$facet": {
                "total": count_stage(),
                "by_status": group_count("workflowStatus"),
                "by_technology": group_count("Technology"),
                "by_branch": group_count("Branch"),
                "recent_activity": [
                    {
                        "$match": {
                            "updated_at": { "$gte": bson::DateTime::from_chrono(recent_since) }
                        }
                    },
                    { "$count": "count" },
                ],
            }
        },
    ]
}

pub fn task_summary_pipeline(query: &TaskQuery, top_n: usize) -> Vec<Document> {
    let completed = doc! { "$match": { "status": TaskStatus::Completed.as_str() } };

    let mut top_experts = vec![completed.clone()];
    top_experts.extend(group_count("assignedTo"));
    top_experts.push(doc! { "$limit": top_n as i64 });

    let mut completed_by_round = vec![completed];
    completed_by_round.extend(group_count("actualRound"));

    vec![
        doc! { "$match": task_match(query) },
        doc! {
            "$facet": {
                "total": count_stage(),
                "by_status": group_count("status"),
                "completed_by_round": completed_by_round,
                "top_experts": top_experts,
            }
        },
    ]
}

pub fn candidate_page_pipeline(filters: &CandidateFilters, skip: u64, limit: u64) -> Vec<Document> {
    let status_count = |status: &str| {
        vec![
            doc! { "$match": { "workflowStatus": status } },
            doc! { "$count": "count" },
        ]
    };

    vec![
        doc! { "$match": candidate_match(filters) },
        doc! {
            "$facet": {
                "total": count_stage(),
                "active": status_count(STATUS_ACTIVE),
                "scheduled": status_count(STATUS_SCHEDULED),
                "rejected": status_count(STATUS_REJECTED),
                "candidates": [
                    { "$sort": { "updated_at": -1 } },
                    { "$skip": skip as i64 },
                    { "$limit": limit as i64 },
                    { "$project": candidate_projection() },
                ],
            }
        },
    ]
}

/// Groups matching tasks per candidate, keeps candidates at or above the
/// threshold and fans out into the capped listing, the suggestion list and
/// the uncapped total.
pub fn active_candidates_pipeline(
    query: &TaskQuery,
    min_interviews: u32,
    list_cap: usize,
    suggestion_cap: usize,
) -> Vec<Document> {
    let mut filter = task_match(query);
    filter.insert("Candidate Name", non_empty_string());

    vec![
        doc! { "$match": filter },
        doc! {
            "$group": {
                "_id": "$Candidate Name",
                "interview_count": { "$sum": 1 },
                "last_interview": { "$max": "$receivedDateTime" },
                "experts": { "$addToSet": "$assignedTo" },
            }
        },
        doc! { "$match": { "interview_count": { "$gte": min_interviews as i64 } } },
        doc! {
            "$facet": {
                "total": count_stage(),
                "candidates": [
                    { "$sort": { "interview_count": -1, "_id": 1 } },
                    { "$limit": list_cap as i64 },
                    {
                        "$lookup": {
                            "from": CANDIDATES,
                            "localField": "_id",
                            "foreignField": "Candidate Name",
                            "as": "details",
                        }
                    },
                    {
                        "$project": {
                            "_id": 0,
                            "name": "$_id",
                            "interview_count": 1,
                            "last_interview": 1,
                            "experts": 1,
                            "technology": { "$arrayElemAt": ["$details.Technology", 0] },
                            "workflow_status": { "$arrayElemAt": ["$details.workflowStatus", 0] },
                            "branch": { "$arrayElemAt": ["$details.Branch", 0] },
                        }
                    },
                ],
                "suggestions": [
                    { "$sort": { "_id": 1 } },
                    { "$limit": suggestion_cap as i64 },
                    { "$project": { "_id": 1 } },
                ],
            }
        },
    ]
}

pub fn expert_round_pipeline(query: &TaskQuery) -> Vec<Document> {
    vec![
        doc! { "$match": task_match(query) },
        doc! {
            "$group": {
                "_id": { "expert": "$assignedTo", "round": "$actualRound" },
                "count": { "$sum": 1 },
            }
        },
    ]
}

pub fn expert_status_pipeline(query: &TaskQuery) -> Vec<Document> {
    let count_status = |status: TaskStatus| {
        doc! { "$sum": { "$cond": [{ "$eq": ["$status", status.as_str()] }, 1, 0] } }
    };

    vec![
        doc! { "$match": task_match(query) },
        doc! {
            "$group": {
                "_id": "$assignedTo",
                "completed": count_status(TaskStatus::Completed),
                "cancelled": count_status(TaskStatus::Cancelled),
                "rescheduled": count_status(TaskStatus::Rescheduled),
                "total": { "$sum": 1 },
            }
        },
        doc! {
            "$project": {
                "_id": 0,
                "expert": "$_id",
                "completed": 1,
                "cancelled": 1,
                "rescheduled": 1,
                "total": 1,
            }
        },
    ]
}

pub fn round_distribution_pipeline(query: &TaskQuery) -> Vec<Document> {
    let mut pipeline = vec![doc! { "$match": task_match(query) }];
    pipeline.extend(group_count("actualRound"));
    pipeline
}

/// Reads a numeric count regardless of which integer width the server chose.
pub fn read_count(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
        _ => 0,
    }
}

fn facet_docs<'a>(facets: &'a Document, name: &str) -> impl Iterator<Item = &'a Document> {
    facets
        .get_array(name)
        .map(|items| items.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(Bson::as_document)
}

/// `{ "$count": "count" }` yields no document at all for an empty input.
pub fn facet_count(facets: &Document, name: &str) -> u64 {
    facet_docs(facets, name)
        .next()
        .map(|item| read_count(item.get("count")))
        .unwrap_or(0)
}

fn group_label(value: Option<&Bson>) -> String {
    match value {
        Some(Bson::String(s)) if !s.trim().is_empty() => s.clone(),
        None | Some(Bson::Null) | Some(Bson::String(_)) => UNKNOWN.to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn facet_buckets(facets: &Document, name: &str) -> Vec<Bucket> {
    facet_docs(facets, name)
        .map(|item| Bucket::new(group_label(item.get("_id")), read_count(item.get("count"))))
        .collect()
}

pub fn decode_buckets(docs: &[Document]) -> Vec<Bucket> {
    docs.iter()
        .map(|item| Bucket::new(group_label(item.get("_id")), read_count(item.get("count"))))
        .collect()
}

pub fn decode_candidate_facets(facets: Option<&Document>) -> CandidateFacets {
    let Some(facets) = facets else {
        return CandidateFacets::default();
    };
    CandidateFacets {
        total: facet_count(facets, "total"),
        by_status: facet_buckets(facets, "by_status"),
        by_technology: facet_buckets(facets, "by_technology"),
        by_branch: facet_buckets(facets, "by_branch"),
        recent_activity: facet_count(facets, "recent_activity"),
    }
}

pub fn decode_task_facets(facets: Option<&Document>) -> TaskFacets {
    let Some(facets) = facets else {
        return TaskFacets::default();
    };
    TaskFacets {
        total: facet_count(facets, "total"),
        by_status: facet_buckets(facets, "by_status"),
        completed_by_round: facet_buckets(facets, "completed_by_round"),
        top_experts: facet_buckets(facets, "top_experts"),
    }
}

pub fn decode_candidate_page(facets: Option<&Document>) -> Result<CandidatePage, StoreError> {
    let Some(facets) = facets else {
        return Ok(CandidatePage::default());
    };
    let candidates = facet_docs(facets, "candidates")
        .map(|item| bson::from_document::<Candidate>(item.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CandidatePage {
        total: facet_count(facets, "total"),
        active: facet_count(facets, "active"),
        scheduled: facet_count(facets, "scheduled"),
        rejected: facet_count(facets, "rejected"),
        candidates,
    })
}

pub fn decode_candidate_activity(
    facets: Option<&Document>,
) -> Result<CandidateActivity, StoreError> {
    let Some(facets) = facets else {
        return Ok(CandidateActivity::default());
    };
    let mut candidates = facet_docs(facets, "candidates")
        .map(|item| bson::from_document::<ActiveCandidate>(item.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    for candidate in &mut candidates {
        candidate.experts.sort();
    }

    let suggestions = facet_docs(facets, "suggestions")
        .filter_map(|item| item.get_str("_id").ok().map(str::to_string))
        .collect();

    Ok(CandidateActivity {
        total: facet_count(facets, "total"),
        candidates,
        suggestions,
    })
}

pub fn decode_expert_round(row: &Document) -> Option<ExpertRoundCount> {
    let key = row.get_document("_id").ok()?;
    let expert = key.get_str("expert").ok()?.to_string();
    let round = key.get_str("round").ok().map(str::to_string);
    Some(ExpertRoundCount {
        expert,
        round,
        count: read_count(row.get("count")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filters::TaskWindow;

    #[test]
    fn task_match_applies_every_filter() {
        let query = TaskQuery {
            window: TaskWindow {
                start: Some("2025-12-01T00:00:00".into()),
                end: Some("2025-12-30T23:59:59".into()),
            },
            statuses: vec!["Completed".into()],
            excluded_rounds: vec!["On demand".into()],
            ..Default::default()
        };

        assert_eq!(
            task_match(&query),
            doc! {
                "status": "Completed",
                "assignedTo": { "$type": "string", "$ne": "" },
                "actualRound": { "$nin": ["On demand"] },
                "receivedDateTime": {
                    "$gte": "2025-12-01T00:00:00",
                    "$lte": "2025-12-30T23:59:59",
                },
            }
        );
    }

    #[test]
    fn contradictory_round_selection_matches_nothing() {
        let query = TaskQuery {
            round: Some("Screening".into()),
            excluded_rounds: vec!["Screening".into()],
            ..Default::default()
        };
        let filter = task_match(&query);
        let round = filter.get_document("actualRound").unwrap();
        assert!(round.get_array("$in").unwrap().is_empty());
    }

    #[test]
    fn empty_candidate_filters_match_everything() {
        assert!(candidate_match(&CandidateFilters::default()).is_empty());

        let filters = CandidateFilters {
            experts: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(candidate_match(&filters), doc! { "Expert": { "$in": [] } });
    }

    #[test]
    fn summary_pipeline_filters_before_fanning_out() {
        let pipeline = candidate_summary_pipeline(&CandidateFilters::default(), Utc::now());
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline[0].contains_key("$match"));
        let facet = pipeline[1].get_document("$facet").unwrap();
        for name in ["total", "by_status", "by_technology", "by_branch", "recent_activity"] {
            assert!(facet.contains_key(name), "missing facet {}", name);
        }
    }

    #[test]
    fn active_pipeline_caps_list_and_suggestions() {
        let pipeline = active_candidates_pipeline(&TaskQuery::default(), 2, 200, 500);
        let facet = pipeline[3].get_document("$facet").unwrap();
        let limit_of = |name: &str| {
            facet
                .get_array(name)
                .unwrap()
                .iter()
                .filter_map(Bson::as_document)
                .find_map(|stage| stage.get_i64("$limit").ok())
        };
        assert_eq!(limit_of("candidates"), Some(200));
        assert_eq!(limit_of("suggestions"), Some(500));
        assert_eq!(limit_of("total"), None);
    }

    #[test]
    fn counts_decode_from_any_numeric_width() {
        assert_eq!(read_count(Some(&Bson::Int32(3))), 3);
        assert_eq!(read_count(Some(&Bson::Int64(4))), 4);
        assert_eq!(read_count(Some(&Bson::Double(5.0))), 5);
        assert_eq!(read_count(Some(&Bson::String("6".into()))), 0);
        assert_eq!(read_count(None), 0);
    }

    #[test]
    fn empty_facets_decode_to_zero_values() {
        let facets = doc! {
            "total": [],
            "by_status": [],
            "completed_by_round": [],
            "top_experts": [],
        };
        assert_eq!(decode_task_facets(Some(&facets)), TaskFacets::default());
        assert_eq!(decode_candidate_facets(None), CandidateFacets::default());
    }

    #[test]
    fn buckets_label_missing_groups_as_unknown() {
        let facets = doc! {
            "by_branch": [
                { "_id": "Pune", "count": 2 },
                { "_id": Bson::Null, "count": 1_i64 },
            ],
        };
        assert_eq!(
            facet_buckets(&facets, "by_branch"),
            vec![Bucket::new("Pune", 2), Bucket::new(UNKNOWN, 1)]
        );
    }

    #[test]
    fn decodes_active_candidates() {
        let facets = doc! {
            "total": [{ "count": 1 }],
            "candidates": [{
                "name": "Asha Rao",
                "interview_count": 3,
                "last_interview": "2025-12-10T10:00:00",
                "experts": ["z@x.com", "a@x.com"],
                "technology": "Java",
            }],
            "suggestions": [{ "_id": "Asha Rao" }],
        };
        let activity = decode_candidate_activity(Some(&facets)).unwrap();
        assert_eq!(activity.total, 1);
        assert_eq!(activity.candidates[0].interview_count, 3);
        assert_eq!(activity.candidates[0].experts, vec!["a@x.com", "z@x.com"]);
        assert_eq!(activity.candidates[0].branch, None);
        assert_eq!(activity.suggestions, vec!["Asha Rao"]);
    }

    #[test]
    fn decodes_expert_round_rows() {
        let row = doc! { "_id": { "expert": "a@x.com", "round": "1st Round" }, "count": 4 };
        assert_eq!(
            decode_expert_round(&row),
            Some(ExpertRoundCount {
                expert: "a@x.com".into(),
                round: Some("1st Round".into()),
                count: 4,
            })
        );
    }
}
