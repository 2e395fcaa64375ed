//! HTTP client for the Mopra backend endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::memory::MemoryEntry;
use crate::platform::SearchPlatform;

#[derive(Serialize)]
struct QueryRequest<'a> {
    prompt: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct OptimizeRequest<'a> {
    current_model: &'a str,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    ai_platform: &'a str,
}

/// Shape shared by the action endpoints (`stop-all`, `optimize-ram`, `memory/clear`)
#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct MemoryResponse {
    #[serde(default)]
    memory: Option<Vec<MemoryEntry>>,
    #[serde(default)]
    error: Option<String>,
}

/// A completed chat answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub content: String,
    /// Model the backend reports having used, if any
    pub model: Option<String>,
}

/// An error field only counts when it carries text.
fn reported_error(error: Option<String>) -> Option<String> {
    error.filter(|e| !e.is_empty())
}

fn require_success(reply: StatusResponse, fallback: &str) -> ApiResult<()> {
    if reply.status.as_deref() == Some("success") {
        Ok(())
    } else {
        Err(ApiError::Backend(
            reported_error(reply.error).unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

#[derive(Clone, Debug)]
pub struct MopraClient {
    client: Client,
    base_url: String,
}

impl MopraClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the inference backend for a completion.
    ///
    /// Unlike the other endpoints a non-2xx status is a failure in itself,
    /// whatever the body says.
    pub async fn query(&self, prompt: &str, model: &str) -> ApiResult<Answer> {
        debug!(model, prompt_len = prompt.len(), "POST /api/query");

        let response = self
            .client
            .post(self.url("/api/query"))
            .json(&QueryRequest { prompt, model })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        let reply: QueryResponse = response.json().await?;
        if let Some(error) = reported_error(reply.error) {
            return Err(ApiError::Backend(error));
        }

        Ok(Answer {
            content: reply.content.unwrap_or_default(),
            model: reply.model.filter(|m| !m.is_empty()),
        })
    }

    /// Ask the backend to halt every running model process.
    pub async fn stop_all(&self) -> ApiResult<()> {
        debug!("POST /api/stop-all");

        let reply: StatusResponse = self
            .client
            .post(self.url("/api/stop-all"))
            .send()
            .await?
            .json()
            .await?;

        require_success(reply, "Failed to stop models")
    }

    /// Ask the backend to free resources held by every model except `current_model`.
    pub async fn optimize_ram(&self, current_model: &str) -> ApiResult<()> {
        debug!(current_model, "POST /api/optimize-ram");

        let reply: StatusResponse = self
            .client
            .post(self.url("/api/optimize-ram"))
            .json(&OptimizeRequest { current_model })
            .send()
            .await?
            .json()
            .await?;

        require_success(reply, "Optimization failed")
    }

    pub async fn online_search(&self, query: &str, platform: SearchPlatform) -> ApiResult<String> {
        debug!(platform = platform.as_str(), "POST /api/online-search");

        let reply: SearchResponse = self
            .client
            .post(self.url("/api/online-search"))
            .json(&SearchRequest {
                query,
                ai_platform: platform.as_str(),
            })
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = reported_error(reply.error) {
            return Err(ApiError::Backend(error));
        }
        Ok(reply.content.unwrap_or_default())
    }

    /// Fetch the backend's prompt/response memory, oldest first as stored.
    pub async fn memory(&self) -> ApiResult<Vec<MemoryEntry>> {
        debug!("GET /api/memory");

        let reply: MemoryResponse = self
            .client
            .get(self.url("/api/memory"))
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = reported_error(reply.error) {
            return Err(ApiError::Backend(error));
        }
        Ok(reply.memory.unwrap_or_default())
    }

    pub async fn clear_memory(&self) -> ApiResult<()> {
        debug!("POST /api/memory/clear");

        let reply: StatusResponse = self
            .client
            .post(self.url("/api/memory/clear"))
            .send()
            .await?
            .json()
            .await?;

        match reported_error(reply.error) {
            Some(error) => Err(ApiError::Backend(error)),
            None => Ok(()),
        }
    }
}
