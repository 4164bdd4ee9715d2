// ai_models store operations: upsert for the sync job, insert for the admin
// surface, and the read queries behind the public API.

use crate::database_ops::db::Db;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// A normalized provider record ready for reconciliation. Keys absent from
/// `benchmark_scores` stay absent in storage; the map never carries nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    pub source_id: String,
    pub name: String,
    pub company: String,
    pub overall_intelligence: f64,
    pub benchmark_scores: BTreeMap<String, f64>,
}

/// A manually added model (admin form). No source_id: manual rows are never
/// touched by the sync job.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub company: String,
    pub description: Option<String>,
    pub overall_intelligence: f64,
    pub benchmark_scores: BTreeMap<String, f64>,
}

/// A persisted leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub id: i64,
    pub source_id: Option<String>,
    pub name: String,
    pub company: String,
    pub description: Option<String>,
    pub overall_intelligence: f64,
    pub benchmark_scores: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}

/// Outcome of a rate-limit claim for a named job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncClaim {
    Claimed,
    Held { retry_after: Duration },
}

/// The two store operations the sync engine depends on. Kept behind a trait
/// so the engine can run against an in-memory store in tests.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn upsert_model(&self, record: &ModelRecord) -> Result<()>;
    async fn try_claim_sync(&self, job_name: &str, min_interval: Duration) -> Result<SyncClaim>;
}

fn scores_to_json(scores: &BTreeMap<String, f64>) -> serde_json::Value {
    serde_json::to_value(scores).unwrap_or_else(|_| serde_json::json!({}))
}

#[async_trait]
impl ModelStore for Db {
    async fn upsert_model(&self, record: &ModelRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_models (source_id, name, company, overall_intelligence, benchmark_scores, last_updated) \
             VALUES ($1,$2,$3,$4,$5, now()) \
             ON CONFLICT (source_id) DO UPDATE SET \
                name = EXCLUDED.name, \
                company = EXCLUDED.company, \
                overall_intelligence = EXCLUDED.overall_intelligence, \
                benchmark_scores = EXCLUDED.benchmark_scores, \
                last_updated = now()",
        )
        .persistent(false)
        .bind(&record.source_id)
        .bind(&record.name)
        .bind(&record.company)
        .bind(record.overall_intelligence)
        .bind(scores_to_json(&record.benchmark_scores))
        .execute(&self.pool)
        .await
        .context("upsert ai_models row")?;
        Ok(())
    }

    async fn try_claim_sync(&self, job_name: &str, min_interval: Duration) -> Result<SyncClaim> {
        let interval_secs = min_interval.as_secs_f64();
        // Conditional claim: the row is only advanced when the interval has
        // elapsed, so the once-per-interval contract holds across instances.
        let claimed = sqlx::query(
            "INSERT INTO sync_jobs (job_name, last_run_at) VALUES ($1, now()) \
             ON CONFLICT (job_name) DO UPDATE SET last_run_at = now() \
             WHERE sync_jobs.last_run_at <= now() - make_interval(secs => $2)",
        )
        .persistent(false)
        .bind(job_name)
        .bind(interval_secs)
        .execute(&self.pool)
        .await
        .context("claim sync_jobs row")?
        .rows_affected();

        if claimed > 0 {
            return Ok(SyncClaim::Claimed);
        }

        let last_run_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_run_at FROM sync_jobs WHERE job_name = $1")
                .persistent(false)
                .bind(job_name)
                .fetch_optional(&self.pool)
                .await?;

        let retry_after = last_run_at
            .map(|last| {
                let elapsed = (Utc::now() - last).num_seconds().max(0) as u64;
                Duration::from_secs(min_interval.as_secs().saturating_sub(elapsed))
            })
            .unwrap_or(min_interval);
        Ok(SyncClaim::Held { retry_after })
    }
}

const MODEL_COLUMNS: &str =
    "id, source_id, name, company, description, overall_intelligence, benchmark_scores, last_updated";

fn row_to_model(row: &PgRow) -> StoredModel {
    StoredModel {
        id: row.get("id"),
        source_id: row.get("source_id"),
        name: row.get("name"),
        company: row.get("company"),
        description: row.get("description"),
        overall_intelligence: row.get("overall_intelligence"),
        benchmark_scores: row.get("benchmark_scores"),
        last_updated: row.get("last_updated"),
    }
}

/// Whitelisted sort orders for the public listing. Anything else falls back
/// to the intelligence ranking so the ORDER BY clause is never caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelSort {
    #[default]
    Intelligence,
    Name,
    Company,
    Recent,
}

impl ModelSort {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("name") => Self::Name,
            Some("company") => Self::Company,
            Some("recent") => Self::Recent,
            _ => Self::Intelligence,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::Intelligence => "overall_intelligence DESC",
            Self::Name => "name ASC",
            Self::Company => "company ASC",
            Self::Recent => "last_updated DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelQuery {
    pub company: Option<String>,
    pub sort: ModelSort,
    pub page: u32,
    pub page_size: u32,
}

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 25;

impl ModelQuery {
    /// Clamp paging inputs to sane bounds (page >= 1, page_size 1..=100).
    pub fn clamped(mut self) -> Self {
        if self.page == 0 {
            self.page = 1;
        }
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self.page_size = self.page_size.min(MAX_PAGE_SIZE);
        self
    }

    fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * (self.page_size as i64)
    }
}

/// List models with optional company filter, whitelisted sort and paging.
/// Returns the page plus the unfiltered-by-paging total for the same filter.
pub async fn list_models(db: &Db, query: &ModelQuery) -> Result<(Vec<StoredModel>, i64)> {
    let query = query.clone().clamped();
    let order = query.sort.order_by();

    let (rows, total) = if let Some(company) = query.company.as_deref() {
        let sql = format!(
            "SELECT {MODEL_COLUMNS} FROM ai_models WHERE company = $1 ORDER BY {order} LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(company)
            .bind(query.page_size as i64)
            .bind(query.offset())
            .fetch_all(&db.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_models WHERE company = $1")
            .persistent(false)
            .bind(company)
            .fetch_one(&db.pool)
            .await?;
        (rows, total)
    } else {
        let sql =
            format!("SELECT {MODEL_COLUMNS} FROM ai_models ORDER BY {order} LIMIT $1 OFFSET $2");
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(query.page_size as i64)
            .bind(query.offset())
            .fetch_all(&db.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_models")
            .persistent(false)
            .fetch_one(&db.pool)
            .await?;
        (rows, total)
    };

    Ok((rows.iter().map(row_to_model).collect(), total))
}

pub async fn get_model(db: &Db, id: i64) -> Result<Option<StoredModel>> {
    let row = sqlx::query(&format!(
        "SELECT {MODEL_COLUMNS} FROM ai_models WHERE id = $1"
    ))
    .persistent(false)
    .bind(id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(row.as_ref().map(row_to_model))
}

/// Full table scan ordered by the default ranking; feeds the companies
/// aggregation and the CSV export.
pub async fn list_all_models(db: &Db) -> Result<Vec<StoredModel>> {
    let rows = sqlx::query(&format!(
        "SELECT {MODEL_COLUMNS} FROM ai_models ORDER BY overall_intelligence DESC"
    ))
    .persistent(false)
    .fetch_all(&db.pool)
    .await?;
    Ok(rows.iter().map(row_to_model).collect())
}

/// Insert a manually added model. Plain insert: admin rows have no source_id
/// and therefore never collide with synced rows.
pub async fn insert_model(db: &Db, model: &NewModel) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO ai_models (name, company, description, overall_intelligence, benchmark_scores, last_updated) \
         VALUES ($1,$2,$3,$4,$5, now()) RETURNING id",
    )
    .persistent(false)
    .bind(&model.name)
    .bind(&model.company)
    .bind(&model.description)
    .bind(model.overall_intelligence)
    .bind(scores_to_json(&model.benchmark_scores))
    .fetch_one(&db.pool)
    .await
    .context("insert ai_models row")?;
    Ok(rec.get("id"))
}

/// Per-company aggregate for the companies endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyStats {
    pub name: String,
    pub model_count: usize,
    pub average_intelligence: f64,
    pub top_model: Option<TopModel>,
    pub capabilities: CompanyCapabilities,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopModel {
    pub id: i64,
    pub name: String,
    pub intelligence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyCapabilities {
    pub coding: bool,
    pub speed: bool,
}

fn has_metric(scores: &serde_json::Value, key: &str) -> bool {
    scores.get(key).and_then(|v| v.as_f64()).is_some()
}

/// Fold stored rows into per-company aggregates, sorted by model count
/// descending (company name as tie-break for stable output).
pub fn fold_company_stats(models: &[StoredModel]) -> Vec<CompanyStats> {
    let mut by_company: HashMap<&str, Vec<&StoredModel>> = HashMap::new();
    for model in models {
        by_company.entry(model.company.as_str()).or_default().push(model);
    }

    let mut stats: Vec<CompanyStats> = by_company
        .into_iter()
        .map(|(company, rows)| {
            let count = rows.len();
            let sum: f64 = rows.iter().map(|m| m.overall_intelligence).sum();
            let top = rows
                .iter()
                .max_by(|a, b| {
                    a.overall_intelligence
                        .partial_cmp(&b.overall_intelligence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|m| TopModel {
                    id: m.id,
                    name: m.name.clone(),
                    intelligence: m.overall_intelligence,
                });
            CompanyStats {
                name: company.to_string(),
                model_count: count,
                average_intelligence: ((sum / count as f64) * 100.0).round() / 100.0,
                top_model: top,
                capabilities: CompanyCapabilities {
                    coding: rows.iter().any(|m| has_metric(&m.benchmark_scores, "coding")),
                    speed: rows.iter().any(|m| has_metric(&m.benchmark_scores, "speed")),
                },
                last_updated: rows.iter().map(|m| m.last_updated).max(),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.model_count
            .cmp(&a.model_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(id: i64, company: &str, intelligence: f64, scores: serde_json::Value) -> StoredModel {
        StoredModel {
            id,
            source_id: Some(format!("m-{id}")),
            name: format!("model-{id}"),
            company: company.to_string(),
            description: None,
            overall_intelligence: intelligence,
            benchmark_scores: scores,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn sort_param_whitelist_falls_back_to_intelligence() {
        assert_eq!(ModelSort::from_param(Some("name")), ModelSort::Name);
        assert_eq!(ModelSort::from_param(Some("recent")), ModelSort::Recent);
        assert_eq!(
            ModelSort::from_param(Some("id; DROP TABLE ai_models")),
            ModelSort::Intelligence
        );
        assert_eq!(ModelSort::from_param(None), ModelSort::Intelligence);
    }

    #[test]
    fn query_clamping_bounds_paging() {
        let q = ModelQuery {
            page: 0,
            page_size: 10_000,
            ..Default::default()
        }
        .clamped();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, MAX_PAGE_SIZE);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn folds_company_aggregates() {
        let models = vec![
            model(1, "Acme", 70.0, json!({"coding": 60.0})),
            model(2, "Acme", 80.0, json!({"speed": 120.5})),
            model(3, "Beta", 90.0, json!({})),
        ];
        let stats = fold_company_stats(&models);
        assert_eq!(stats.len(), 2);

        let acme = &stats[0];
        assert_eq!(acme.name, "Acme");
        assert_eq!(acme.model_count, 2);
        assert_eq!(acme.average_intelligence, 75.0);
        assert_eq!(acme.top_model.as_ref().unwrap().id, 2);
        assert!(acme.capabilities.coding);
        assert!(acme.capabilities.speed);

        let beta = &stats[1];
        assert_eq!(beta.model_count, 1);
        assert!(!beta.capabilities.coding);
    }

    #[test]
    fn null_metric_does_not_count_as_capability() {
        let models = vec![model(1, "Acme", 70.0, json!({"coding": null}))];
        let stats = fold_company_stats(&models);
        assert!(!stats[0].capabilities.coding);
    }
}
