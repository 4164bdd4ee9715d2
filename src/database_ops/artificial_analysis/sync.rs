// Catalog synchronization: fetch the Artificial Analysis model list,
// normalize and validate each record, and reconcile into the store via
// upsert keyed on the provider's id. Batch failures abort the run; record
// failures are skipped with a reason and the run continues.

use crate::database_ops::artificial_analysis::provider::AnalysisProvider;
use crate::database_ops::models::{ModelRecord, ModelStore, SyncClaim};
use crate::normalization::company::canonicalize_company;
use crate::normalization::metric::{metric_spec, normalize_metric, round_to};
use crate::util::env::{env_opt, env_parse};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Claim row name in sync_jobs shared by every runner of this job.
pub const SYNC_JOB_NAME: &str = "artificial_analysis_models";

/// Default minimum interval between runs (seconds).
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 300;

const MAX_TEXT_LEN: usize = 100;

/// Batch-level failures. Record-level problems never surface here; they are
/// folded into `SyncResult::skipped`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("provider API key not configured (set ARTIFICIAL_ANALYSIS_API_KEY)")]
    MissingApiKey,

    #[error("sync ran too recently; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider fetch failed: {0}")]
    Fetch(String),

    #[error("store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedRecord {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub updated: u32,
    pub total: u32,
    pub skipped: Vec<SkippedRecord>,
}

/// Provider evaluation fields, keyed by the internal metric name.
const EVALUATION_FIELDS: &[(&str, &str)] = &[
    ("coding", "artificial_analysis_coding_index"),
    ("math", "artificial_analysis_math_index"),
    ("mmlu_pro", "mmlu_pro"),
    ("gpqa", "gpqa"),
    ("hle", "hle"),
    ("livecodebench", "livecodebench"),
    ("scicode", "scicode"),
    ("math_500", "math_500"),
    ("aime", "aime"),
];

/// Top-level performance fields.
const PERFORMANCE_FIELDS: &[(&str, &str)] = &[
    ("speed", "median_output_tokens_per_second"),
    ("latency", "median_time_to_first_token_seconds"),
    ("time_to_first_answer_token", "median_time_to_first_answer_token"),
];

pub struct SyncEngine {
    provider: AnalysisProvider,
    min_interval: Duration,
}

impl SyncEngine {
    pub fn new(provider: AnalysisProvider, min_interval: Duration) -> Self {
        Self {
            provider,
            min_interval,
        }
    }

    /// Build from environment. Fails before any network or store traffic
    /// when the provider key is absent.
    pub fn from_env() -> Result<Self, SyncError> {
        let api_key = env_opt("ARTIFICIAL_ANALYSIS_API_KEY").ok_or(SyncError::MissingApiKey)?;
        let base_url = env_opt("ARTIFICIAL_ANALYSIS_BASE_URL");
        let timeout_secs = env_parse("ARTIFICIAL_ANALYSIS_TIMEOUT_SECS", 30u64);
        let min_interval = Duration::from_secs(env_parse(
            "SYNC_MIN_INTERVAL_SECS",
            DEFAULT_MIN_INTERVAL_SECS,
        ));

        let provider = AnalysisProvider::new(base_url.as_deref(), api_key, Some(timeout_secs))
            .map_err(|e| SyncError::Fetch(e.to_string()))?;
        Ok(Self::new(provider, min_interval))
    }

    /// One full run: claim the rate-limit slot, fetch, normalize, reconcile.
    /// The claim happens before the fetch, so even a run that fails mid-way
    /// holds the interval.
    pub async fn run<S: ModelStore>(&self, store: &S) -> Result<SyncResult, SyncError> {
        match store
            .try_claim_sync(SYNC_JOB_NAME, self.min_interval)
            .await
            .map_err(|e| SyncError::Store(e.to_string()))?
        {
            SyncClaim::Held { retry_after } => {
                return Err(SyncError::RateLimited {
                    retry_after_secs: retry_after.as_secs().max(1),
                });
            }
            SyncClaim::Claimed => {}
        }

        let records = self
            .provider
            .fetch_models()
            .await
            .map_err(|e| SyncError::Fetch(e.to_string()))?;
        info!(total = records.len(), "artificial_analysis: catalog fetched");

        let result = reconcile(&records, store).await;
        info!(
            updated = result.updated,
            total = result.total,
            skipped = result.skipped.len(),
            "artificial_analysis: sync complete"
        );
        Ok(result)
    }
}

/// Phases 2+3 over an already-fetched batch. Each record is normalized,
/// validated and upserted independently; one record's failure never stops
/// the rest.
pub async fn reconcile<S: ModelStore>(records: &[Value], store: &S) -> SyncResult {
    let mut result = SyncResult {
        total: records.len() as u32,
        ..Default::default()
    };

    for raw in records {
        let record = match normalize_record(raw) {
            Ok(record) => record,
            Err(reason) => {
                result.skipped.push(SkippedRecord {
                    id: raw_text(raw, "id"),
                    name: raw_text(raw, "name"),
                    reason,
                });
                continue;
            }
        };

        // One awaited upsert at a time: duplicate ids within a payload
        // resolve deterministically to last-processed-wins.
        match store.upsert_model(&record).await {
            Ok(()) => result.updated += 1,
            Err(err) => {
                warn!(source_id = %record.source_id, error = %err, "model upsert failed");
                result.skipped.push(SkippedRecord {
                    id: record.source_id.clone(),
                    name: record.name.clone(),
                    reason: "write failed".to_string(),
                });
            }
        }
    }

    result
}

fn raw_text(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn sanitize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX_TEXT_LEN {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_TEXT_LEN).collect()
}

/// Map one provider record into the internal shape. Returns a human-readable
/// skip reason when the record cannot be written.
pub fn normalize_record(raw: &Value) -> Result<ModelRecord, String> {
    let name = sanitize_text(raw.get("name").and_then(|v| v.as_str()).unwrap_or(""));
    let company_raw = raw
        .pointer("/model_creator/name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let company = canonicalize_company(&sanitize_text(company_raw));
    let source_id = raw_text(raw, "id");

    let overall = raw
        .pointer("/evaluations/artificial_analysis_intelligence_index")
        .and_then(|v| normalize_metric("overall_intelligence", v));

    let Some(overall) = overall else {
        return Err("missing required fields".to_string());
    };
    if name.is_empty() || company.is_empty() || source_id.is_empty() {
        return Err("missing required fields".to_string());
    }

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for (key, field) in EVALUATION_FIELDS {
        if let Some(value) = raw.pointer(&format!("/evaluations/{field}")) {
            if let Some(normalized) = normalize_metric(key, value) {
                scores.insert((*key).to_string(), normalized);
            }
        }
    }
    for (key, field) in PERFORMANCE_FIELDS {
        if let Some(value) = raw.get(*field) {
            if let Some(normalized) = normalize_metric(key, value) {
                scores.insert((*key).to_string(), normalized);
            }
        }
    }

    if let Some(price) = raw
        .pointer("/pricing/price_1m_blended_3_to_1")
        .and_then(|v| normalize_metric("price", v))
    {
        scores.insert("price".to_string(), price);
        // Reciprocal only for strictly positive prices; a free tier must not
        // rank as infinitely efficient.
        if price > 0.0 {
            if let Some(spec) = metric_spec("cost_efficiency") {
                scores.insert(
                    "cost_efficiency".to_string(),
                    round_to(1.0 / price, spec.rounding.decimals()),
                );
            }
        }
    }

    Ok(ModelRecord {
        source_id,
        name,
        company,
        overall_intelligence: overall,
        benchmark_scores: scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Instant;

    /// In-memory stand-in for the Postgres store.
    #[derive(Default)]
    struct MemStore {
        records: Mutex<HashMap<String, ModelRecord>>,
        fail_ids: HashSet<String>,
        last_claim: Mutex<Option<Instant>>,
    }

    impl MemStore {
        fn with_failures(ids: &[&str]) -> Self {
            Self {
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        fn get(&self, source_id: &str) -> Option<ModelRecord> {
            self.records.lock().unwrap().get(source_id).cloned()
        }
    }

    #[async_trait]
    impl ModelStore for MemStore {
        async fn upsert_model(&self, record: &ModelRecord) -> Result<()> {
            if self.fail_ids.contains(&record.source_id) {
                return Err(anyhow!("unique constraint violation"));
            }
            self.records
                .lock()
                .unwrap()
                .insert(record.source_id.clone(), record.clone());
            Ok(())
        }

        async fn try_claim_sync(&self, _job: &str, min_interval: Duration) -> Result<SyncClaim> {
            let mut last = self.last_claim.lock().unwrap();
            if let Some(at) = *last {
                let elapsed = at.elapsed();
                if elapsed < min_interval {
                    return Ok(SyncClaim::Held {
                        retry_after: min_interval - elapsed,
                    });
                }
            }
            *last = Some(Instant::now());
            Ok(SyncClaim::Claimed)
        }
    }

    fn full_record() -> Value {
        json!({
            "id": "gpt-9",
            "name": "GPT-9",
            "model_creator": { "name": "OpenAI" },
            "evaluations": {
                "artificial_analysis_intelligence_index": 74.26,
                "artificial_analysis_coding_index": 68.91,
                "artificial_analysis_math_index": 81.0,
                "mmlu_pro": 0.8412,
                "gpqa": 0.7126
            },
            "median_output_tokens_per_second": 153.27,
            "median_time_to_first_token_seconds": 0.44,
            "pricing": { "price_1m_blended_3_to_1": 2.5 }
        })
    }

    #[test]
    fn normalizes_a_full_record() {
        let record = normalize_record(&full_record()).unwrap();
        assert_eq!(record.source_id, "gpt-9");
        assert_eq!(record.name, "GPT-9");
        assert_eq!(record.company, "OpenAI");
        assert_eq!(record.overall_intelligence, 74.3);
        assert_eq!(record.benchmark_scores["coding"], 68.9);
        assert_eq!(record.benchmark_scores["math"], 81.0);
        assert_eq!(record.benchmark_scores["mmlu_pro"], 0.841);
        assert_eq!(record.benchmark_scores["speed"], 153.3);
        assert_eq!(record.benchmark_scores["latency"], 0.4);
        assert_eq!(record.benchmark_scores["price"], 2.5);
        assert_eq!(record.benchmark_scores["cost_efficiency"], 0.4);
    }

    #[test]
    fn canonicalizes_creator_aliases() {
        let mut raw = full_record();
        raw["model_creator"]["name"] = json!("Google DeepMind");
        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.company, "Google");
    }

    #[test]
    fn caps_name_length() {
        let mut raw = full_record();
        raw["name"] = json!("x".repeat(240));
        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.name.chars().count(), 100);
    }

    #[test]
    fn rejects_non_numeric_intelligence() {
        let mut raw = full_record();
        raw["evaluations"]["artificial_analysis_intelligence_index"] = json!("not-a-number");
        let err = normalize_record(&raw).unwrap_err();
        assert!(err.contains("required fields"));
    }

    #[test]
    fn rejects_missing_company() {
        let mut raw = full_record();
        raw["model_creator"] = json!({ "name": "   " });
        assert!(normalize_record(&raw).is_err());
    }

    #[test]
    fn rejects_empty_source_id() {
        let mut raw = full_record();
        raw["id"] = json!("  ");
        assert!(normalize_record(&raw).is_err());
    }

    #[test]
    fn null_metric_is_absent_not_zero() {
        let mut raw = full_record();
        raw["median_output_tokens_per_second"] = Value::Null;
        let record = normalize_record(&raw).unwrap();
        assert!(!record.benchmark_scores.contains_key("speed"));
    }

    #[test]
    fn zero_price_yields_no_cost_efficiency() {
        let mut raw = full_record();
        raw["pricing"]["price_1m_blended_3_to_1"] = json!(0.0);
        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.benchmark_scores["price"], 0.0);
        assert!(!record.benchmark_scores.contains_key("cost_efficiency"));
    }

    #[test]
    fn absent_pricing_yields_no_price_keys() {
        let mut raw = full_record();
        raw.as_object_mut().unwrap().remove("pricing");
        let record = normalize_record(&raw).unwrap();
        assert!(!record.benchmark_scores.contains_key("price"));
        assert!(!record.benchmark_scores.contains_key("cost_efficiency"));
    }

    #[tokio::test]
    async fn reconcile_scenario_batch_of_three() {
        let store = MemStore::default();

        let mut missing_company = full_record();
        missing_company["id"] = json!("model-b");
        missing_company["model_creator"] = json!({});

        let mut zero_price = full_record();
        zero_price["id"] = json!("model-c");
        zero_price["pricing"]["price_1m_blended_3_to_1"] = json!(0.0);

        let batch = vec![full_record(), missing_company, zero_price];
        let result = reconcile(&batch, &store).await;

        assert_eq!(result.total, 3);
        assert_eq!(result.updated, 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].id, "model-b");
        assert!(result.skipped[0].reason.contains("required fields"));

        let stored_c = store.get("model-c").unwrap();
        assert!(!stored_c.benchmark_scores.contains_key("cost_efficiency"));
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let store = MemStore::default();
        let mut second = full_record();
        second["id"] = json!("claude-12");
        second["name"] = json!("Claude 12");
        let batch = vec![full_record(), second];

        let first_run = reconcile(&batch, &store).await;
        let second_run = reconcile(&batch, &store).await;

        // Last-write-wins upsert: the second run reports the same updates
        // and does not create duplicate rows.
        assert_eq!(first_run.updated, second_run.updated);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_within_a_payload_resolve_last_wins() {
        let store = MemStore::default();
        let mut renamed = full_record();
        renamed["name"] = json!("GPT-9 Turbo");
        let batch = vec![full_record(), renamed];

        let result = reconcile(&batch, &store).await;
        assert_eq!(result.updated, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("gpt-9").unwrap().name, "GPT-9 Turbo");
    }

    #[tokio::test]
    async fn failed_upserts_are_reported_not_dropped() {
        let store = MemStore::with_failures(&["gpt-9"]);
        let mut ok = full_record();
        ok["id"] = json!("other-model");

        let result = reconcile(&[full_record(), ok], &store).await;
        assert_eq!(result.updated, 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].id, "gpt-9");
        assert_eq!(result.skipped[0].reason, "write failed");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn second_run_within_interval_is_rate_limited() {
        let store = MemStore::default();
        // Unroutable base url: the guard must reject before any fetch.
        let provider =
            AnalysisProvider::new(Some("http://127.0.0.1:1"), "key".into(), Some(1)).unwrap();
        let engine = SyncEngine::new(provider, Duration::from_secs(300));

        assert_eq!(
            store
                .try_claim_sync(SYNC_JOB_NAME, Duration::from_secs(300))
                .await
                .unwrap(),
            SyncClaim::Claimed
        );

        let err = engine.run(&store).await.unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
        assert_eq!(store.len(), 0);
    }
}
