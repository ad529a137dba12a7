//! The external services the pipeline talks to, as traits.
//!
//! [crate::search::SearchClient] and [crate::azure_openai::AzureOpenAiEmbedder] are the
//! real implementations; tests substitute stubs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::query::SearchRequest;
use crate::record::GolfBall;
use crate::schema::IndexSchema;

/// One raw result row as returned by the search service.
pub type SearchRow = serde_json::Map<String, serde_json::Value>;

/// Creates or updates the index definition in place.
#[async_trait]
pub trait IndexManager: Send + Sync {
    async fn create_or_update_index(&self, schema: &IndexSchema) -> Result<(), ProviderError>;
}

/// Turns text into a fixed-length vector. The model deployment is bound at construction.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Uploads a batch of documents. Returns one status per document; a document the
/// service rejected is reported in its status, not as an `Err`.
#[async_trait]
pub trait DocumentUploader: Send + Sync {
    async fn upload_batch(&self, balls: &[GolfBall]) -> Result<Vec<DocumentStatus>, ProviderError>;
}

/// Runs a vector query and returns rows in the service's relevance order.
#[async_trait]
pub trait VectorSearcher: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchRow>, ProviderError>;
}

/// Per-document outcome of an upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatus {
    pub key: String,
    #[serde(rename = "status")]
    pub succeeded: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub status_code: u16,
}

impl DocumentStatus {
    pub fn accepted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            error_message: None,
            status_code: 201,
        }
    }

    pub fn rejected(key: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: false,
            error_message: Some(message.into()),
            status_code,
        }
    }
}

/// Parses a service base URL such as `https://name.search.windows.net`.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, ProviderError> {
    Url::parse(endpoint.trim()).map_err(|e| ProviderError::InvalidEndpoint(endpoint.to_string(), e))
}

/// `base` + `path`, with `api-version` as the only query parameter.
pub(crate) fn service_url(base: &Url, path: &str, api_version: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(None);
    url.query_pairs_mut().append_pair("api-version", api_version);
    url
}

/// HTTP client that sends `api-key` and a JSON content type on every request.
pub(crate) fn api_key_client(api_key: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    let mut key = HeaderValue::from_str(api_key.trim())
        .map_err(|_| ProviderError::Other("API key is not a valid header value".to_string()))?;
    key.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert("api-key", key);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()?)
}

/// Fails with [ProviderError::Api] on a non-2xx status, keeping the body for context.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ProviderError::Api {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Other(String),
}
