//! Azure OpenAI client for embeddings. One request per text, against a single deployment.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::provider::{api_key_client, parse_endpoint, read_json, service_url, EmbeddingProvider, ProviderError};

pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Embeddings client bound to one Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiEmbedder {
    client: reqwest::Client,
    url: Url,
    deployment: String,
    dimensions: Option<usize>,
}

impl AzureOpenAiEmbedder {
    /// `endpoint` is the resource URL, e.g. `https://my-resource.openai.azure.com`.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base = parse_endpoint(endpoint)?;
        let url = service_url(
            &base,
            &format!("openai/deployments/{}/embeddings", deployment.trim()),
            DEFAULT_API_VERSION,
        );
        Ok(Self {
            client: api_key_client(api_key, timeout)?,
            url,
            deployment: deployment.trim().to_string(),
            dimensions: None,
        })
    }

    /// Ask the model for vectors of exactly `dimensions` elements.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            input: text,
            dimensions: self.dimensions,
        };
        let response = self.client.post(self.url.clone()).json(&request).send().await?;
        let parsed: EmbeddingResponse = read_json(response).await?;
        first_embedding(parsed)
    }
}

fn first_embedding(mut response: EmbeddingResponse) -> Result<Vec<f32>, ProviderError> {
    response.data.sort_by_key(|d| d.index);
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_deployment() {
        let e = AzureOpenAiEmbedder::new(
            "https://golf.openai.azure.com/",
            "key",
            "embed-small",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            e.url.as_str(),
            "https://golf.openai.azure.com/openai/deployments/embed-small/embeddings?api-version=2024-06-01"
        );
        assert_eq!(e.deployment(), "embed-small");
    }

    #[test]
    fn request_omits_unset_dimensions() {
        let body = serde_json::to_value(EmbeddingRequest {
            input: "hi",
            dimensions: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "input": "hi" }));

        let body = serde_json::to_value(EmbeddingRequest {
            input: "hi",
            dimensions: Some(2),
        })
        .unwrap();
        assert_eq!(body["dimensions"], 2);
    }

    #[test]
    fn picks_first_embedding_by_index() {
        let parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[9.0]},
                {"object":"embedding","index":0,"embedding":[0.1,0.2]}
            ],"model":"text-embedding-3-small"}"#,
        )
        .unwrap();
        assert_eq!(first_embedding(parsed).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn empty_data_is_invalid_response() {
        let parsed: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(
            first_embedding(parsed),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
