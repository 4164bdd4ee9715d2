// API request/response models (DTOs)

use crate::database_ops::artificial_analysis::SyncError;
use crate::database_ops::models::{NewModel, StoredModel};
use crate::normalization::metric::normalize_metric;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// Query string for the public model listing
#[derive(Debug, Deserialize)]
pub struct ModelListQuery {
    pub company: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<StoredModel>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_secs: i64,
}

/// Manual model submission from the admin surface. Numeric fields arrive as
/// optional numbers; empty inputs are omitted client-side.
#[derive(Debug, Deserialize)]
pub struct AddModelRequest {
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub description: Option<String>,
    pub overall_intelligence: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub cost_efficiency: Option<f64>,
    #[serde(default)]
    pub coding: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<f64>,
}

impl AddModelRequest {
    /// Validate into a writable record; unusable optional metrics are
    /// dropped rather than stored as zero.
    pub fn into_new_model(self) -> Result<NewModel, String> {
        let name = self.name.trim().to_string();
        let company = self.company.trim().to_string();
        if name.is_empty() || company.is_empty() {
            return Err("name and company are required".to_string());
        }
        let overall = normalize_metric(
            "overall_intelligence",
            &serde_json::json!(self.overall_intelligence),
        )
        .ok_or_else(|| "overall_intelligence must be a number between 0 and 100".to_string())?;

        let mut benchmark_scores = BTreeMap::new();
        for (key, value) in [
            ("speed", self.speed),
            ("cost_efficiency", self.cost_efficiency),
            ("coding", self.coding),
            ("reasoning", self.reasoning),
        ] {
            if let Some(value) = value {
                if let Some(normalized) = normalize_metric(key, &serde_json::json!(value)) {
                    benchmark_scores.insert(key.to_string(), normalized);
                }
            }
        }

        Ok(NewModel {
            name,
            company,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            overall_intelligence: overall,
            benchmark_scores,
        })
    }
}

impl actix_web::ResponseError for SyncError {
    fn status_code(&self) -> StatusCode {
        match self {
            SyncError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SyncError::MissingApiKey | SyncError::Fetch(_) | SyncError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AddModelRequest {
        AddModelRequest {
            name: " Orion 2 ".to_string(),
            company: "Acme".to_string(),
            description: Some("  ".to_string()),
            overall_intelligence: 65.456,
            speed: Some(120.04),
            cost_efficiency: None,
            coding: Some(f64::NAN),
            reasoning: None,
        }
    }

    #[test]
    fn validates_and_rounds_manual_submission() {
        let model = request().into_new_model().unwrap();
        assert_eq!(model.name, "Orion 2");
        assert_eq!(model.overall_intelligence, 65.5);
        assert_eq!(model.benchmark_scores["speed"], 120.0);
        // NaN never becomes a stored zero
        assert!(!model.benchmark_scores.contains_key("coding"));
        assert!(model.description.is_none());
    }

    #[test]
    fn rejects_blank_required_fields() {
        let mut req = request();
        req.company = "   ".to_string();
        assert!(req.into_new_model().is_err());
    }

    #[test]
    fn rejects_out_of_range_intelligence() {
        let mut req = request();
        req.overall_intelligence = 240.0;
        assert!(req.into_new_model().is_err());
    }
}
