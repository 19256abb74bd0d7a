use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;

use crate::utils::logger::LOGGER;

/// Dashboard, active-candidate and analytics reports.
pub fn report_ttl() -> Duration {
    Duration::minutes(5)
}

/// Teams, active experts and filter option lists.
pub fn reference_ttl() -> Duration {
    Duration::minutes(10)
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

/// Deterministic cache key: a route name plus its normalised, sorted filter
/// parameters. Absent parameters are left out, so an empty filter and a
/// missing filter produce the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    route: &'static str,
    params: BTreeMap<&'static str, String>,
}

impl CacheKey {
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            params: BTreeMap::new(),
        }
    }

    pub fn param<V: ToString>(mut self, name: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.params.insert(name, value.to_string());
        }
        self
    }

    pub fn build(&self) -> String {
        if self.params.is_empty() {
            return self.route.to_string();
        }
        // JSON keeps values containing separators unambiguous
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{}:{}", self.route, params)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendStats {
    pub entries: usize,
    pub expired_entries: usize,
    pub capacity: usize,
}

/// Storage behind the cache. The in-memory map is the only implementation
/// today; a shared external cache would slot in here.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn purge_expired(&self) -> Result<usize, CacheError>;

    async fn stats(&self) -> Result<BackendStats, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Process-local TTL map with a hard entry limit.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))
    }
}

fn remove_expired(entries: &mut HashMap<String, CacheEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut entries = self.lock()?;
        let now = Utc::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        let now = Utc::now();

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            remove_expired(&mut entries, now);
            if entries.len() >= self.max_entries {
                if let Some(oldest_key) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(key, _)| key.clone())
                {
                    entries.remove(&oldest_key);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = self.lock()?;
        Ok(remove_expired(&mut entries, Utc::now()))
    }

    async fn stats(&self) -> Result<BackendStats, CacheError> {
        let entries = self.lock()?;
        let now = Utc::now();
        Ok(BackendStats {
            entries: entries.len(),
            expired_entries: entries.values().filter(|entry| !entry.is_live(now)).count(),
            capacity: self.max_entries,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub backend: String,
    pub entries: usize,
    pub expired_entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Wraps report computations in the configured backend.
///
/// Backend failures never surface to callers: a failed read is treated as a
/// miss and a failed write is logged and dropped.
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn in_memory(max_entries: usize) -> Self {
        Self::new(Arc::new(MemoryBackend::new(max_entries)))
    }

    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute_fn: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.build();
        let start_time = Instant::now();

        if let Some(value) = self.read(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.log_cache_event("cache_hit", &key, start_time.elapsed().as_millis() as f64);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = compute_fn().await?;
        self.log_cache_event("cache_miss", &key, start_time.elapsed().as_millis() as f64);

        self.write(&key, &computed, ttl).await;
        Ok(computed)
    }

    pub async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let cleaned = self.backend.purge_expired().await?;

        if cleaned > 0 {
            LOGGER.log_business_event(
                "cache_cleanup_completed",
                [(
                    "cleaned_entries".to_string(),
                    serde_json::Value::Number(serde_json::Number::from(cleaned)),
                )]
                .into_iter()
                .collect(),
            );
        }

        Ok(cleaned)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let backend = self.backend.stats().await?;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        Ok(CacheStats {
            backend: self.backend.name().to_string(),
            entries: backend.entries,
            expired_entries: backend.expired_entries,
            capacity: backend.capacity,
            hits,
            misses,
            hit_ratio: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        })
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.backend.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                self.log_backend_failure("read", key, &e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_backend_failure("read", key, &CacheError::Serialization(e.to_string()));
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let result = match serde_json::to_value(value) {
            Ok(json) => self.backend.put(key, json, ttl).await,
            Err(e) => Err(CacheError::Serialization(e.to_string())),
        };

        if let Err(e) = result {
            self.log_backend_failure("write", key, &e);
        }
    }

    fn log_cache_event(&self, metric: &str, key: &str, duration_ms: f64) {
        LOGGER.log_performance_metric(
            metric,
            duration_ms,
            [
                ("cache_backend".to_string(), self.backend.name().to_string()),
                ("cache_key".to_string(), key.to_string()),
            ]
            .into_iter()
            .collect(),
        );
    }

    fn log_backend_failure(&self, operation: &str, key: &str, error: &CacheError) {
        LOGGER.log_error(
            &error.to_string(),
            [
                ("operation".to_string(), serde_json::json!(operation)),
                ("cache_key".to_string(), serde_json::json!(key)),
            ]
            .into_iter()
            .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Report {
        total: u64,
        ratio: f64,
        labels: Vec<String>,
    }

    fn report() -> Report {
        Report {
            total: 3,
            ratio: 66.7,
            labels: vec!["Active".into(), "Completed".into()],
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn put(
            &self,
            _key: &str,
            _value: serde_json::Value,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn purge_expired(&self) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn stats(&self) -> Result<BackendStats, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn hit_skips_recompute_and_returns_identical_output() {
        let cache = CacheService::in_memory(10);
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new("dashboard").param("team", Some("Team A"));

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(report())
        };

        let first = cache.get_or_compute(&key, report_ttl(), compute).await.unwrap();
        let second = cache
            .get_or_compute(&key, report_ttl(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(report())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let stats = cache.stats().await.unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let cache = CacheService::in_memory(10);
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new("teams");

        for _ in 0..2 {
            cache
                .get_or_compute(&key, Duration::milliseconds(10), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(report())
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = CacheService::in_memory(10);
        let key = CacheKey::new("kpi");

        let failed: Result<Report, String> = cache
            .get_or_compute(&key, report_ttl(), || async { Err("store down".to_string()) })
            .await;
        assert!(failed.is_err());

        let recovered: Result<Report, String> = cache
            .get_or_compute(&key, report_ttl(), || async { Ok(report()) })
            .await;
        assert_eq!(recovered.unwrap(), report());
    }

    #[test]
    fn key_is_independent_of_parameter_order() {
        let a = CacheKey::new("experts")
            .param("team", Some("Team A"))
            .param("start", Some("2025-12-01T00:00:00"));
        let b = CacheKey::new("experts")
            .param("start", Some("2025-12-01T00:00:00"))
            .param("team", Some("Team A"));
        assert_eq!(a.build(), b.build());

        let c = CacheKey::new("experts").param("team", Some("Team B"));
        assert_ne!(a.build(), c.build());
        assert_ne!(
            CacheKey::new("experts").build(),
            CacheKey::new("teams").build()
        );
    }

    #[test]
    fn absent_parameters_are_omitted() {
        let key = CacheKey::new("experts").param::<&str>("team", None);
        assert_eq!(key.build(), "experts");
    }

    #[tokio::test]
    async fn live_count_never_exceeds_capacity() {
        let backend = MemoryBackend::new(3);
        for i in 0..10 {
            backend
                .put(&format!("key-{}", i), serde_json::json!(i), report_ttl())
                .await
                .unwrap();
            assert!(backend.stats().await.unwrap().entries <= 3);
        }
        assert!(backend.get("key-9").await.unwrap().is_some());
        assert!(backend.get("key-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_before_live_ones() {
        let backend = MemoryBackend::new(2);
        backend
            .put("stale", serde_json::json!(1), Duration::milliseconds(1))
            .await
            .unwrap();
        backend
            .put("fresh", serde_json::json!(2), report_ttl())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        backend
            .put("newest", serde_json::json!(3), report_ttl())
            .await
            .unwrap();
        assert!(backend.get("fresh").await.unwrap().is_some());
        assert!(backend.get("newest").await.unwrap().is_some());
        assert!(backend.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_entries() {
        let cache = CacheService::in_memory(10);
        cache
            .get_or_compute(&CacheKey::new("short"), Duration::milliseconds(1), || async {
                Ok::<_, CacheError>(1)
            })
            .await
            .unwrap();
        cache
            .get_or_compute(&CacheKey::new("long"), report_ttl(), || async {
                Ok::<_, CacheError>(2)
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn backend_failures_fail_open() {
        let cache = CacheService::new(Arc::new(FailingBackend));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_compute(&CacheKey::new("dashboard"), report_ttl(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(report())
                })
                .await
                .unwrap();
            assert_eq!(value, report());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
