use crate::infrastructure::error::EngineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

const BLOCKS_TABLE: &str = "blocks";

/// Wire shape of a persisted block row. Column names follow the hosted
/// table schema, which is flat lowercase rather than snake_case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockRow {
    pub id: String,
    pub user_id: String,
    pub day: u32,
    pub starttime: f64,
    pub endtime: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

/// Row-level access to the hosted block table, scoped to one user.
///
/// Every mutation returns the representation rows the server echoed
/// back, so callers can reconcile local state against the canonical
/// write result.
#[async_trait]
pub trait BlockApiClient: Send + Sync {
    async fn list_rows(&self, user_id: &str) -> Result<Vec<Value>, EngineError>;

    async fn upsert_row(&self, row: &BlockRow) -> Result<Vec<Value>, EngineError>;

    async fn delete_row(&self, block_id: &str, user_id: &str) -> Result<Vec<Value>, EngineError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBlockApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl ReqwestBlockApiClient {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), EngineError> {
        if value.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "{field} must not be empty"
            )));
        }
        Ok(())
    }

    fn table_endpoint(&self) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                EngineError::Store("block api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("rest");
            segments.push("v1");
            segments.push(BLOCKS_TABLE);
        }
        Ok(url)
    }

    /// An expired session shows up either as a 401 or as an auth-layer
    /// body mentioning the JWT or refresh token.
    fn classify_failure(status: reqwest::StatusCode, body: &str) -> EngineError {
        if status == reqwest::StatusCode::UNAUTHORIZED
            || body.contains("JWT")
            || body.contains("refresh")
        {
            return EngineError::SessionExpired;
        }
        let message = if body.trim().is_empty() {
            format!("block api error: http {}", status.as_u16())
        } else {
            format!("block api error: http {}; body={body}", status.as_u16())
        };
        EngineError::Store(message)
    }

    fn parse_rows(body: &str) -> Result<Vec<Value>, EngineError> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: Value = serde_json::from_str(body)
            .map_err(|error| EngineError::Store(format!("invalid block api payload: {error}; body={body}")))?;
        match parsed {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }

    async fn read_rows(&self, response: reqwest::Response) -> Result<Vec<Value>, EngineError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| EngineError::Store(format!("failed reading block api response: {error}")))?;
        if !status.is_success() {
            return Err(Self::classify_failure(status, &body));
        }
        Self::parse_rows(&body)
    }
}

#[async_trait]
impl BlockApiClient for ReqwestBlockApiClient {
    async fn list_rows(&self, user_id: &str) -> Result<Vec<Value>, EngineError> {
        Self::ensure_non_empty(user_id, "user id")?;

        let endpoint = self.table_endpoint()?;
        let user_filter = format!("eq.{user_id}");
        let response = self
            .client
            .get(endpoint)
            .query(&[("select", "*"), ("user_id", user_filter.as_str())])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|error| EngineError::Store(format!("network error while listing blocks: {error}")))?;

        self.read_rows(response).await
    }

    async fn upsert_row(&self, row: &BlockRow) -> Result<Vec<Value>, EngineError> {
        Self::ensure_non_empty(&row.id, "block id")?;
        Self::ensure_non_empty(&row.user_id, "user id")?;

        let endpoint = self.table_endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .query(&[("on_conflict", "id")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .json(row)
            .send()
            .await
            .map_err(|error| EngineError::Store(format!("network error while saving block: {error}")))?;

        self.read_rows(response).await
    }

    async fn delete_row(&self, block_id: &str, user_id: &str) -> Result<Vec<Value>, EngineError> {
        Self::ensure_non_empty(block_id, "block id")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let endpoint = self.table_endpoint()?;
        let id_filter = format!("eq.{block_id}");
        let user_filter = format!("eq.{user_id}");
        let response = self
            .client
            .delete(endpoint)
            .query(&[
                ("id", id_filter.as_str()),
                ("user_id", user_filter.as_str()),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|error| EngineError::Store(format!("network error while deleting block: {error}")))?;

        self.read_rows(response).await
    }
}
