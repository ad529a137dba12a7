//! Everything the `dimple` CLI does, independent of how it is run.
//!
//! The golf-ball catalog comes from a CSV file; embeddings come from an Azure OpenAI
//! deployment; the index lives in Azure AI Search. The external services sit behind the
//! traits in [provider], so the pipeline can run against stubs.

pub mod app_data;
pub mod azure_openai;
pub mod catalog;
pub mod config;
pub mod embedding_text;
pub mod ingest;
pub mod provider;
pub mod query;
pub mod record;
pub mod schema;
pub mod search;

pub use azure_openai::AzureOpenAiEmbedder;
pub use catalog::{load_catalog, LoadError};
pub use config::{require, AzureSettings, ConfigError, ConfigSources, Settings};
pub use embedding_text::{embedding_text, embedding_texts};
pub use ingest::{ingest_catalog, ingest_records, IngestError, IngestOptions, IngestReport, IngestStage};
pub use provider::{
    DocumentStatus, DocumentUploader, EmbeddingProvider, IndexManager, ProviderError, SearchRow,
    VectorSearcher,
};
pub use query::{build_search_request, map_row, run_query, QueryError, SearchQuery, SearchRequest};
pub use record::GolfBall;
pub use schema::{build_index_schema, parse_dimensions, DimensionalityError, IndexSchema, SchemaError};
pub use search::SearchClient;
