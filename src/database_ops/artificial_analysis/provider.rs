use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push_str("…");
    }
    s
}

/// Artificial Analysis catalog client.
/// Public API (base): https://artificialanalysis.ai/
///
/// Key endpoint:
/// - GET /api/v2/data/llms/models - Full model catalog with evaluation,
///   performance and pricing fields (authenticated via x-api-key header)
///
/// Records come back as raw JSON values on purpose: the provider adds and
/// retires benchmark fields between runs, and every numeric field is
/// independently nullable. Normalization happens downstream.
#[derive(Debug, Clone)]
pub struct AnalysisProvider {
    base_url: String,
    http: Client,
    api_key: String,
}

impl AnalysisProvider {
    pub fn new(base_url: Option<&str>, api_key: String, timeout_secs: Option<u64>) -> Result<Self> {
        let base_url = base_url
            .unwrap_or("https://artificialanalysis.ai")
            .trim_end_matches('/')
            .to_string();
        let timeout_secs = timeout_secs.unwrap_or(30);
        let http = Client::builder()
            .user_agent("AiLeaderboard/1.0")
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            http,
            api_key,
        })
    }

    /// Fetch the full model catalog. Any non-success status or a body
    /// without the top-level `data` array fails the whole call; there is no
    /// per-record recovery at this layer.
    pub async fn fetch_models(&self) -> Result<Vec<Value>> {
        let url = format!("{}/api/v2/data/llms/models", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "Artificial Analysis fetch failed: {status} url={url} body={body}"
            ));
        }

        let body: Value = resp.json().await?;

        let Some(models) = body.get("data").and_then(|v| v.as_array()) else {
            // Defensive: keep a helpful error for unexpected shapes
            // (prevents a drifted payload from reading as an empty catalog).
            return Err(anyhow!(
                "Unexpected Artificial Analysis response shape (missing 'data' array)"
            ));
        };

        Ok(models.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_initialization() {
        let provider = AnalysisProvider::new(None, "test-key".into(), Some(30)).unwrap();
        assert!(provider.base_url.contains("artificialanalysis"));
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash_trimmed() {
        let provider =
            AnalysisProvider::new(Some("http://localhost:9999/"), "k".into(), Some(1)).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9999");
    }
}
