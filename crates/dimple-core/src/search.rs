//! Azure AI Search REST client: index definition, document upload and vector queries.
//! Holds no state beyond the connection; the index itself lives in the service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::provider::{
    api_key_client, check_status, parse_endpoint, read_json, service_url, DocumentStatus,
    DocumentUploader, IndexManager, ProviderError, SearchRow, VectorSearcher,
};
use crate::query::SearchRequest;
use crate::record::GolfBall;
use crate::schema::IndexSchema;

pub const DEFAULT_API_VERSION: &str = "2024-07-01";

/// Client for one index on one search service.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: Url,
    index_name: String,
}

impl SearchClient {
    /// `endpoint` is the service URL, e.g. `https://my-service.search.windows.net`.
    pub fn new(
        endpoint: &str,
        admin_key: &str,
        index_name: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: api_key_client(admin_key, timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            index_name: index_name.trim().to_string(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn index_url(&self, index_name: &str) -> Url {
        service_url(&self.endpoint, &format!("indexes/{}", index_name), DEFAULT_API_VERSION)
    }

    fn docs_url(&self, action: &str) -> Url {
        service_url(
            &self.endpoint,
            &format!("indexes/{}/docs/{}", self.index_name, action),
            DEFAULT_API_VERSION,
        )
    }
}

#[async_trait]
impl IndexManager for SearchClient {
    /// PUT on the index resource creates it or updates it in place.
    async fn create_or_update_index(&self, schema: &IndexSchema) -> Result<(), ProviderError> {
        let url = self.index_url(&schema.name);
        tracing::debug!(index = %schema.name, "putting index definition");
        let response = self
            .client
            .put(url)
            .header("Prefer", "return=minimal")
            .json(schema)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentUploader for SearchClient {
    async fn upload_batch(&self, balls: &[GolfBall]) -> Result<Vec<DocumentStatus>, ProviderError> {
        if balls.is_empty() {
            return Ok(Vec::new());
        }
        let batch = upload_batch_body(balls);
        tracing::debug!(index = %self.index_name, documents = balls.len(), "uploading batch");
        let response = self.client.post(self.docs_url("index")).json(&batch).send().await?;
        let parsed: IndexingResponse = read_json(response).await?;
        Ok(parsed.value)
    }
}

#[async_trait]
impl VectorSearcher for SearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchRow>, ProviderError> {
        let response = self.client.post(self.docs_url("search")).json(request).send().await?;
        let parsed: SearchResponse = read_json(response).await?;
        Ok(parsed.value)
    }
}

fn upload_batch_body(balls: &[GolfBall]) -> IndexBatch<'_> {
    IndexBatch {
        value: balls
            .iter()
            .map(|doc| IndexAction {
                action: "upload",
                doc,
            })
            .collect(),
    }
}

#[derive(Serialize)]
struct IndexBatch<'a> {
    value: Vec<IndexAction<'a>>,
}

#[derive(Serialize)]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    doc: &'a GolfBall,
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    value: Vec<DocumentStatus>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchRow>,
}
