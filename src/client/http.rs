//! HTTP implementation of [`MemoryService`] over the Mnemon REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::client::traits::MemoryService;
use crate::config::MemoryConfig;
use crate::types::{ChatMessage, Fact, Memory, MemoryError, Result};

// ============= Response Envelopes =============

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    facts: Vec<Fact>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    memories: Vec<Memory>,
}

#[derive(Debug, Deserialize)]
struct DeleteAllResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ============= Client =============

/// HTTP client for the Mnemon memory service.
///
/// One [`reqwest::Client`] is built per instance and reused across requests.
/// All methods authenticate with the configured API key as a bearer token.
pub struct MemoryApi {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MemoryApi {
    /// Create a client from configuration.
    ///
    /// Fails fast on invalid configuration; no request is attempted.
    pub fn new(config: &MemoryConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| MemoryError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// The base URL requests are issued against, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Api {
                status: status.as_u16(),
                message: api_message(&status.to_string(), &body),
            });
        }

        Ok(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| MemoryError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    // ============= Record Management =============

    /// Fetch a single memory record by id.
    pub async fn get_memory(&self, id: &str) -> Result<Memory> {
        let response = self
            .send(self.http_client.get(self.url(&format!("/memories/{}", id))))
            .await?;
        Self::decode(response).await
    }

    /// Replace the content of an existing memory record.
    pub async fn update_memory(&self, id: &str, content: &str) -> Result<Memory> {
        let response = self
            .send(
                self.http_client
                    .put(self.url(&format!("/memories/{}", id)))
                    .json(&json!({ "content": content })),
            )
            .await?;
        Self::decode(response).await
    }

    /// Delete a single memory record.
    pub async fn delete_memory(&self, id: &str) -> Result<()> {
        self.send(
            self.http_client
                .delete(self.url(&format!("/memories/{}", id))),
        )
        .await?;
        Ok(())
    }

    /// List a user's memory records, newest first.
    pub async fn list_memories(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Memory>> {
        let response = self
            .send(self.http_client.get(self.url("/memories")).query(&[
                ("user_id", user_id),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
            ]))
            .await?;
        let list: ListResponse = Self::decode(response).await?;
        Ok(list.memories)
    }

    /// Delete every memory record of a user. Returns the number removed.
    pub async fn delete_all(&self, user_id: &str) -> Result<u64> {
        let response = self
            .send(
                self.http_client
                    .delete(self.url("/memories"))
                    .query(&[("user_id", user_id)]),
            )
            .await?;
        let result: DeleteAllResponse = Self::decode(response).await?;
        Ok(result.deleted)
    }
}

#[async_trait]
impl MemoryService for MemoryApi {
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<Fact>> {
        let response = self
            .send(self.http_client.post(self.url("/search")).json(&json!({
                "user_id": user_id,
                "query": query,
                "limit": limit,
            })))
            .await?;

        let search: SearchResponse = Self::decode(response).await?;
        Ok(search.facts)
    }

    async fn extract_from_conversation(
        &self,
        user_id: &str,
        turns: &[ChatMessage],
        metadata: Option<serde_json::Value>,
    ) -> Result<Vec<Memory>> {
        let messages: Vec<_> = turns
            .iter()
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "user_id": user_id,
            "messages": messages,
        });
        if let Some(metadata) = metadata {
            body["metadata"] = metadata;
        }

        let response = self
            .send(self.http_client.post(self.url("/conversations")).json(&body))
            .await?;

        // The extraction endpoint answers with a bare array of memories.
        let memories: Vec<Memory> = Self::decode(response).await?;
        Ok(memories)
    }

    async fn store(
        &self,
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Memory>> {
        let mut body = json!({
            "user_id": user_id,
            "content": content,
        });
        if let Some(metadata) = metadata {
            body["metadata"] = metadata;
        }

        let response = self
            .send(self.http_client.post(self.url("/memories")).json(&body))
            .await?;

        // 204 means the service judged the content not memorable.
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let memory: Memory = Self::decode(response).await?;
        Ok(Some(memory))
    }
}

/// Picks the error message for a failed response: the `error` field of a
/// JSON body when present, the raw body when non-empty, the status line
/// otherwise.
fn api_message(status_line: &str, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    if body.trim().is_empty() {
        status_line.to_string()
    } else {
        body.trim().to_string()
    }
}
