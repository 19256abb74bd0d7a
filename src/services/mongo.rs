use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use mongodb::{
    options::{AggregateOptions, ClientOptions, FindOptions},
    Client, Collection, Database,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::candidate::{Candidate, CandidateActivity, CandidateField, CandidatePage};
use crate::models::filters::{CandidateFilters, TaskQuery};
use crate::models::interview::InterviewTask;
use crate::models::team::Team;
use crate::services::pipelines::{self, CANDIDATES, TASKS, TEAMS};
use crate::services::store::{
    Bucket, CandidateFacets, ExpertRoundCount, ExpertStatusCount, InterviewStore, StoreError,
    TaskFacets, MAX_SCAN,
};
use crate::utils::config::AppConfig;
use crate::utils::logger::LOGGER;

const MAX_POOL_SIZE: u32 = 10;
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const APP_NAME: &str = "interview-insights";

async fn client_options(uri: &str) -> Result<ClientOptions, StoreError> {
    let mut options = ClientOptions::parse(uri).await?;
    options.max_pool_size = Some(MAX_POOL_SIZE);
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    options.connect_timeout = Some(CONNECT_TIMEOUT);
    options.retry_writes = Some(true);
    options.app_name = Some(APP_NAME.to_string());
    Ok(options)
}

/// Pooled MongoDB access. Teams may come from a separate deployment; when the
/// URIs match the pool is shared.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
    teams_db: Database,
}

impl MongoStore {
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let client = Client::with_options(client_options(&config.mongo_uri).await?)?;

        let teams_client = if config.teams_mongo_uri == config.mongo_uri {
            client.clone()
        } else {
            Client::with_options(client_options(&config.teams_mongo_uri).await?)?
        };

        tracing::info!(
            "MongoDB client configured for database {} (teams: {})",
            config.mongo_db,
            config.teams_mongo_db
        );

        Ok(Self {
            db: client.database(&config.mongo_db),
            teams_db: teams_client.database(&config.teams_mongo_db),
        })
    }

    fn candidates<T: Send + Sync>(&self) -> Collection<T> {
        self.db.collection(CANDIDATES)
    }

    fn tasks<T: Send + Sync>(&self) -> Collection<T> {
        self.db.collection(TASKS)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let start_time = Instant::now();
        let options = AggregateOptions::builder().allow_disk_use(true).build();

        let mut cursor = self
            .db
            .collection::<Document>(collection)
            .aggregate(pipeline.clone(), options)
            .await?;

        let mut rows = Vec::new();
        while cursor.advance().await? {
            rows.push(cursor.deserialize_current()?);
        }

        LOGGER.log_aggregation(
            collection,
            &pipeline,
            start_time.elapsed().as_millis(),
            Some(rows.len()),
        );

        Ok(rows)
    }

    async fn find_all<T>(
        &self,
        collection: Collection<T>,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let mut cursor = collection.find(filter, options).await?;
        let mut rows = Vec::new();
        while cursor.advance().await? {
            rows.push(cursor.deserialize_current()?);
        }
        Ok(rows)
    }

    async fn distinct_strings(
        &self,
        collection: Collection<Document>,
        field: &str,
        filter: Document,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let values = collection.distinct(field, filter, None).await?;
        Ok(sorted_strings(values, limit))
    }
}

/// Non-empty strings only, sorted and capped.
fn sorted_strings(values: Vec<Bson>, limit: usize) -> Vec<String> {
    let mut strings: Vec<String> = values
        .into_iter()
        .filter_map(|value| match value {
            Bson::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .collect();
    strings.sort();
    strings.dedup();
    strings.truncate(limit);
    strings
}

#[async_trait]
impl InterviewStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        let options = FindOptions::builder()
            .projection(doc! { "_id": 0, "name": 1, "members": 1 })
            .build();
        self.find_all(self.teams_db.collection::<Team>(TEAMS), doc! {}, options)
            .await
    }

    async fn candidate_facets(
        &self,
        filters: &CandidateFilters,
        recent_since: DateTime<Utc>,
    ) -> Result<CandidateFacets, StoreError> {
        let rows = self
            .aggregate(
                CANDIDATES,
                pipelines::candidate_summary_pipeline(filters, recent_since),
            )
            .await?;
        Ok(pipelines::decode_candidate_facets(rows.first()))
    }

    async fn task_facets(&self, query: &TaskQuery, top_n: usize) -> Result<TaskFacets, StoreError> {
        let rows = self
            .aggregate(TASKS, pipelines::task_summary_pipeline(query, top_n))
            .await?;
        Ok(pipelines::decode_task_facets(rows.first()))
    }

    async fn candidate_page(
        &self,
        filters: &CandidateFilters,
        skip: u64,
        limit: u64,
    ) -> Result<CandidatePage, StoreError> {
        let rows = self
            .aggregate(
                CANDIDATES,
                pipelines::candidate_page_pipeline(filters, skip, limit),
            )
            .await?;
        pipelines::decode_candidate_page(rows.first())
    }

    async fn search_candidates(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let filter = doc! {
            "Candidate Name": { "$regex": regex::escape(term), "$options": "i" }
        };
        let options = FindOptions::builder()
            .projection(pipelines::candidate_projection())
            .sort(doc! { "Candidate Name": 1 })
            .limit(limit as i64)
            .build();
        self.find_all(self.candidates::<Candidate>(), filter, options)
            .await
    }

    async fn candidate_activity(
        &self,
        query: &TaskQuery,
        min_interviews: u32,
        list_cap: usize,
        suggestion_cap: usize,
    ) -> Result<CandidateActivity, StoreError> {
        let pipeline =
            pipelines::active_candidates_pipeline(query, min_interviews, list_cap, suggestion_cap);
        let rows = self.aggregate(TASKS, pipeline).await?;
        pipelines::decode_candidate_activity(rows.first())
    }

    async fn candidate_distinct(
        &self,
        field: CandidateField,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.distinct_strings(self.candidates(), field.as_str(), doc! {}, limit)
            .await
    }

    async fn expert_round_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertRoundCount>, StoreError> {
        let rows = self
            .aggregate(TASKS, pipelines::expert_round_pipeline(query))
            .await?;
        Ok(rows.iter().filter_map(pipelines::decode_expert_round).collect())
    }

    async fn expert_status_counts(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<ExpertStatusCount>, StoreError> {
        let rows = self
            .aggregate(TASKS, pipelines::expert_status_pipeline(query))
            .await?;
        rows.into_iter()
            .map(|row| bson::from_document::<ExpertStatusCount>(row).map_err(StoreError::from))
            .collect()
    }

    async fn find_tasks(
        &self,
        query: &TaskQuery,
        limit: i64,
    ) -> Result<Vec<InterviewTask>, StoreError> {
        let options = FindOptions::builder()
            .projection(pipelines::task_projection())
            .sort(doc! { "receivedDateTime": -1 })
            .limit(limit.min(MAX_SCAN))
            .build();
        self.find_all(self.tasks::<InterviewTask>(), pipelines::task_match(query), options)
            .await
    }

    async fn round_distribution(&self, query: &TaskQuery) -> Result<Vec<Bucket>, StoreError> {
        let rows = self
            .aggregate(TASKS, pipelines::round_distribution_pipeline(query))
            .await?;
        Ok(pipelines::decode_buckets(&rows))
    }

    async fn distinct_experts(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.distinct_strings(self.tasks(), "assignedTo", pipelines::task_match(query), limit)
            .await
    }

    async fn candidate_experts(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, String>, StoreError> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let options = FindOptions::builder()
            .projection(doc! { "_id": 0, "Candidate Name": 1, "Expert": 1 })
            .build();
        let filter = doc! { "Candidate Name": { "$in": names.to_vec() } };
        let candidates = self
            .find_all(self.candidates::<Candidate>(), filter, options)
            .await?;

        Ok(candidates
            .into_iter()
            .filter_map(|candidate| {
                let name = candidate.name.filter(|name| !name.is_empty())?;
                let expert = candidate.expert.filter(|expert| !expert.is_empty())?;
                Some((name, expert.to_lowercase()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_values_drop_blanks_and_non_strings() {
        let values = vec![
            Bson::String("Python".into()),
            Bson::Null,
            Bson::String(" ".into()),
            Bson::String("Java".into()),
            Bson::Int32(3),
            Bson::String("Python".into()),
        ];
        assert_eq!(sorted_strings(values, 500), vec!["Java", "Python"]);
        let values = vec![Bson::String("a".into()), Bson::String("b".into())];
        assert_eq!(sorted_strings(values, 1), vec!["a"]);
    }
}
