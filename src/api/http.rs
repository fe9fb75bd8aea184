//! reqwest implementation of the backend traits

use super::error::{ApiError, ApiResult};
use super::types::*;
use super::{AuthApi, ChatApi, DocumentApi, LogApi, ProductApi, ProgressCallback};
use crate::config::BackendConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// HTTP client for the GCN backend
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    logs_url: Url,
    auth_url: Url,
    timeout: Duration,
    upload_chunk_size: usize,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Other(e.into()))?;

        Ok(Self {
            client,
            base_url: parse_base(&config.base_url)?,
            logs_url: parse_base(config.logs_url())?,
            auth_url: parse_base(config.auth_url())?,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            upload_chunk_size: 64 * 1024,
        })
    }

    pub fn with_upload_chunk_size(mut self, chunk_size: usize) -> Self {
        self.upload_chunk_size = chunk_size.max(1);
        self
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.send().await.map_err(ApiError::from_network_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Backend returned {}: {}", status, body);
        Err(ApiError::from_http_status(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        let response = self.send(self.client.get(url).timeout(self.timeout)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET an array endpoint, keeping only the elements that decode
    async fn get_lenient_list<T: DeserializeOwned>(&self, url: Url) -> ApiResult<Vec<T>> {
        let value: serde_json::Value = self.get_json(url).await?;
        Ok(lenient_list(value))
    }
}

fn parse_base(raw: &str) -> ApiResult<Url> {
    Url::parse(raw)
        .map_err(|e| ApiError::Other(anyhow::anyhow!("Invalid backend URL '{}': {}", raw, e)))
}

/// Append path segments to a base URL, percent-encoding each one
fn endpoint(base: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::Other(anyhow::anyhow!("Backend URL cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn lenient_list<T: DeserializeOwned>(value: serde_json::Value) -> Vec<T> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!("Skipping malformed list entry: {}", e);
                    None
                }
            })
            .collect(),
        other => {
            if !other.is_null() {
                tracing::warn!("Expected a JSON array, got {}", other);
            }
            Vec::new()
        }
    }
}

/// Percentage of `sent` out of `total`, rounded to the nearest integer
fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent * 100 + total / 2) / total).min(100) as u8
}

#[async_trait]
impl ChatApi for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> ApiResult<QueryResponse> {
        let url = endpoint(&self.base_url, &["api", "query"])?;
        let response = self
            .send(self.client.post(url).timeout(self.timeout).json(request))
            .await?;
        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn chat_list(&self) -> ApiResult<Vec<ChatSummary>> {
        let url = endpoint(&self.base_url, &["api", "chat-list"])?;
        self.get_lenient_list(url).await
    }

    async fn delete_chat(&self, chat_id: &str) -> ApiResult<()> {
        let mut url = endpoint(&self.base_url, &["api", "chat"])?;
        url.query_pairs_mut().append_pair("chatId", chat_id);
        self.send(self.client.delete(url).timeout(self.timeout))
            .await?;
        Ok(())
    }

    async fn chat_history(&self, chat_id: &str) -> ApiResult<Vec<ChatMessageTurn>> {
        let url = endpoint(&self.base_url, &["api", "chat-history", chat_id])?;
        self.get_lenient_list(url).await
    }
}

#[async_trait]
impl ProductApi for HttpBackend {
    async fn products(&self) -> ApiResult<Vec<Product>> {
        let url = endpoint(&self.base_url, &["api", "products"])?;
        self.get_lenient_list(url).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> ApiResult<()> {
        let url = endpoint(&self.base_url, &["api", "products"])?;
        self.send(self.client.post(url).timeout(self.timeout).json(draft))
            .await?;
        Ok(())
    }

    async fn update_product(&self, id: &str, draft: &ProductDraft) -> ApiResult<()> {
        let url = endpoint(&self.base_url, &["api", "products", id])?;
        self.send(self.client.put(url).timeout(self.timeout).json(draft))
            .await?;
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> ApiResult<()> {
        let url = endpoint(&self.base_url, &["api", "products", id])?;
        self.send(self.client.delete(url).timeout(self.timeout))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentApi for HttpBackend {
    async fn documents(&self) -> ApiResult<Vec<LoadedDocument>> {
        let url = endpoint(&self.base_url, &["api", "documents", "list"])?;
        self.get_lenient_list(url).await
    }

    async fn upload_document(
        &self,
        file_name: &str,
        data: Vec<u8>,
        progress: ProgressCallback,
    ) -> ApiResult<()> {
        let url = endpoint(&self.base_url, &["api", "documents", "upload"])?;
        let total = data.len();
        let chunks: Vec<Vec<u8>> = data
            .chunks(self.upload_chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        progress(0);
        let reporter = progress.clone();
        let mut sent = 0usize;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            reporter(percent(sent, total));
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            total as u64,
        )
        .file_name(file_name.to_string())
        .mime_str("application/pdf")
        .map_err(|e| ApiError::Other(e.into()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        self.send(self.client.post(url).multipart(form)).await?;
        progress(100);
        Ok(())
    }

    async fn delete_document(&self, name: &str) -> ApiResult<()> {
        let url = endpoint(&self.base_url, &["api", "documents", name])?;
        self.send(self.client.delete(url).timeout(self.timeout))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LogApi for HttpBackend {
    async fn logs(&self, last_id: u64) -> ApiResult<Vec<LogEntry>> {
        let mut url = endpoint(&self.logs_url, &["api", "logs"])?;
        url.query_pairs_mut()
            .append_pair("lastId", &last_id.to_string());
        self.get_lenient_list(url).await
    }
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn organizations(&self) -> ApiResult<Vec<String>> {
        let url = endpoint(&self.auth_url, &["api", "organizations"])?;
        let value: serde_json::Value = self.get_json(url).await?;
        let names = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(name) => Some(name),
                    serde_json::Value::Object(map) => map
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(names)
    }

    async fn signup(&self, request: &SignupRequest) -> ApiResult<()> {
        let url = endpoint(&self.auth_url, &["api", "signup"])?;
        self.send(self.client.post(url).timeout(self.timeout).json(request))
            .await?;
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        let url = endpoint(&self.auth_url, &["api", "login"])?;
        let response = self
            .send(self.client.post(url).timeout(self.timeout).json(request))
            .await?;
        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}
