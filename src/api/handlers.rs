// HTTP request handlers for API endpoints

use crate::api::auth::{self, AuthSettings};
use crate::api::models::*;
use crate::database_ops::artificial_analysis::{SyncEngine, SyncError};
use crate::database_ops::db::Db;
use crate::database_ops::models::{
    self, fold_company_stats, ModelQuery, ModelSort, StoredModel, DEFAULT_PAGE_SIZE,
};
use crate::normalization::metric::METRIC_SPECS;
use actix_web::error::ErrorInternalServerError;
use actix_web::{web, HttpResponse, Result};
use std::time::SystemTime;

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let uptime = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Public model listing with company filter, sort and pagination
pub async fn list_models(
    query: web::Query<ModelListQuery>,
    db: web::Data<Db>,
) -> Result<HttpResponse> {
    let store_query = ModelQuery {
        company: query.company.clone().filter(|c| !c.trim().is_empty()),
        sort: ModelSort::from_param(query.sort.as_deref()),
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    }
    .clamped();

    let (models_page, total) = models::list_models(&db, &store_query)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "model listing failed");
            ErrorInternalServerError("Failed to fetch models")
        })?;

    let page_size = store_query.page_size as i64;
    let response = ApiResponse::success(ModelListResponse {
        models: models_page,
        pagination: Pagination {
            page: store_query.page,
            page_size: store_query.page_size,
            total,
            total_pages: (total + page_size - 1) / page_size,
        },
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Single model by store id
pub async fn get_model(path: web::Path<i64>, db: web::Data<Db>) -> Result<HttpResponse> {
    let id = path.into_inner();

    match models::get_model(&db, id).await {
        Ok(Some(model)) => Ok(HttpResponse::Ok().json(ApiResponse::success(model))),
        Ok(None) => {
            Ok(HttpResponse::NotFound().json(ApiResponse::<StoredModel>::error("Model not found")))
        }
        Err(e) => {
            tracing::error!(error = %e, id, "model lookup failed");
            Err(ErrorInternalServerError("Failed to fetch model"))
        }
    }
}

/// Per-company aggregates for the companies page
pub async fn list_companies(db: web::Data<Db>) -> Result<HttpResponse> {
    let all = models::list_all_models(&db).await.map_err(|e| {
        tracing::error!(error = %e, "companies listing failed");
        ErrorInternalServerError("Failed to fetch companies data")
    })?;

    let stats = fold_company_stats(&all);
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

/// Full leaderboard as a CSV download
pub async fn export_models_csv(db: web::Data<Db>) -> Result<HttpResponse> {
    let all = models::list_all_models(&db).await.map_err(|e| {
        tracing::error!(error = %e, "csv export query failed");
        ErrorInternalServerError("Failed to export models")
    })?;

    let body = models_to_csv(&all).map_err(|e| {
        tracing::error!(error = %e, "csv serialization failed");
        ErrorInternalServerError("Failed to export models")
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"ai-models.csv\"",
        ))
        .body(body))
}

/// Serialize rows to CSV, one column per known metric. Absent metrics stay
/// empty cells so a missing benchmark never exports as zero.
pub fn models_to_csv(models: &[StoredModel]) -> anyhow::Result<Vec<u8>> {
    let metric_keys: Vec<&str> = METRIC_SPECS
        .iter()
        .map(|s| s.key)
        .filter(|k| *k != "overall_intelligence")
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["id", "name", "company", "overall_intelligence"];
    header.extend(metric_keys.iter().copied());
    header.push("last_updated");
    writer.write_record(&header)?;

    for model in models {
        let mut row = vec![
            model.id.to_string(),
            model.name.clone(),
            model.company.clone(),
            model.overall_intelligence.to_string(),
        ];
        for key in &metric_keys {
            let cell = model
                .benchmark_scores
                .get(*key)
                .and_then(|v| v.as_f64())
                .map(|v| v.to_string())
                .unwrap_or_default();
            row.push(cell);
        }
        row.push(model.last_updated.to_rfc3339());
        writer.write_record(&row)?;
    }

    Ok(writer.into_inner()?)
}

/// Exchange admin credentials for a short-lived token
pub async fn login(
    payload: web::Json<LoginRequest>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse> {
    if payload.username != settings.admin_username || payload.password != settings.admin_password {
        return Ok(HttpResponse::Unauthorized()
            .json(ApiResponse::<LoginResponse>::error("Invalid credentials")));
    }

    let token = auth::issue_token(&settings.secret, &payload.username).map_err(|e| {
        tracing::error!(error = %e, "token signing failed");
        ErrorInternalServerError("Failed to issue token")
    })?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(LoginResponse {
        token,
        expires_in_secs: auth::TOKEN_TTL_SECS,
    })))
}

/// Manually add a model (admin)
pub async fn add_model(
    payload: web::Json<AddModelRequest>,
    db: web::Data<Db>,
) -> Result<HttpResponse> {
    let model = match payload.into_inner().into_new_model() {
        Ok(model) => model,
        Err(reason) => {
            return Ok(HttpResponse::BadRequest().json(ApiResponse::<i64>::error(reason)));
        }
    };

    let id = models::insert_model(&db, &model).await.map_err(|e| {
        tracing::error!(error = %e, "manual model insert failed");
        ErrorInternalServerError("Failed to add model")
    })?;

    tracing::info!(id, name = %model.name, "model added manually");
    Ok(HttpResponse::Created().json(ApiResponse::success(serde_json::json!({ "id": id }))))
}

/// Trigger a one-shot provider sync (admin)
pub async fn trigger_sync(db: web::Data<Db>) -> std::result::Result<HttpResponse, SyncError> {
    let engine = SyncEngine::from_env()?;
    let result = engine.run(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn csv_export_leaves_absent_metrics_empty() {
        let models = vec![StoredModel {
            id: 7,
            source_id: Some("m-7".into()),
            name: "Orion".into(),
            company: "Acme".into(),
            description: None,
            overall_intelligence: 61.5,
            benchmark_scores: json!({"coding": 55.1, "price": 1.25}),
            last_updated: Utc::now(),
        }];

        let bytes = models_to_csv(&models).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        let row = lines.next().unwrap();

        assert!(header.starts_with("id,name,company,overall_intelligence"));
        assert!(header.contains("coding"));
        assert!(row.contains("Orion"));
        assert!(row.contains("55.1"));
        // speed column exists but the cell is empty, not 0
        let speed_idx = header.split(',').position(|h| h == "speed").unwrap();
        assert_eq!(row.split(',').nth(speed_idx).unwrap(), "");
    }
}
