//! The search index definition for the golf-ball catalog.
//!
//! Serializes to the Azure AI Search REST index format. Only the vector dimensions and
//! the vectorizer connection come from configuration; fields and HNSW parameters are fixed.

use std::fmt;

use serde::Serialize;

use crate::config::{self, AzureSettings};

pub const VECTOR_FIELD: &str = "vectorContent";
pub const VECTOR_PROFILE: &str = "golf-vector-profile";
pub const HNSW_CONFIG: &str = "golfHnsw";
pub const VECTORIZER: &str = "golfOpenAIVectorizer";
pub const SEMANTIC_CONFIG: &str = "golf-semantic-config";

/// HNSW neighbor count (`m`).
pub const HNSW_M: u32 = 4;
pub const HNSW_EF_CONSTRUCTION: u32 = 400;
pub const HNSW_EF_SEARCH: u32 = 500;
pub const HNSW_METRIC: &str = "cosine";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<SearchField>,
    pub vector_search: VectorSearch,
    pub semantic: SemanticSearch,
}

impl IndexSchema {
    /// Dimensions declared on the vector field.
    pub fn vector_dimensions(&self) -> Option<usize> {
        self.fields
            .iter()
            .find(|f| f.name == VECTOR_FIELD)
            .and_then(|f| f.dimensions)
    }

    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Collection(Edm.Single)")]
    SingleCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub key: bool,
    pub searchable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub facetable: bool,
    pub retrievable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

impl SearchField {
    /// A retrievable field that is not full-text searchable.
    pub fn simple(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            key: false,
            searchable: false,
            filterable: false,
            sortable: false,
            facetable: false,
            retrievable: true,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    /// A full-text searchable string field.
    pub fn searchable(name: &str) -> Self {
        Self {
            searchable: true,
            ..Self::simple(name, FieldType::String)
        }
    }

    pub fn vector(name: &str, dimensions: usize, profile: &str) -> Self {
        Self {
            searchable: true,
            dimensions: Some(dimensions),
            vector_search_profile: Some(profile.to_string()),
            ..Self::simple(name, FieldType::SingleCollection)
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorSearch {
    pub algorithms: Vec<HnswAlgorithm>,
    pub profiles: Vec<VectorProfile>,
    pub vectorizers: Vec<Vectorizer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswAlgorithm {
    pub name: String,
    pub kind: &'static str,
    pub hnsw_parameters: HnswParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    pub m: u32,
    pub ef_construction: u32,
    pub ef_search: u32,
    pub metric: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorProfile {
    pub name: String,
    pub algorithm: String,
    pub vectorizer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vectorizer {
    pub name: String,
    pub kind: &'static str,
    #[serde(rename = "azureOpenAIParameters")]
    pub azure_openai_parameters: AzureOpenAiParameters,
}

#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureOpenAiParameters {
    pub resource_uri: String,
    pub deployment_id: String,
    pub api_key: String,
    pub model_name: String,
}

impl fmt::Debug for AzureOpenAiParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiParameters")
            .field("resource_uri", &self.resource_uri)
            .field("deployment_id", &self.deployment_id)
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticSearch {
    pub configurations: Vec<SemanticConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfiguration {
    pub name: String,
    pub prioritized_fields: PrioritizedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedFields {
    pub title_field: SemanticField,
    pub prioritized_content_fields: Vec<SemanticField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticField {
    pub field_name: String,
}

impl SemanticField {
    fn new(name: &str) -> Self {
        Self {
            field_name: name.to_string(),
        }
    }
}

/// Parses the configured vector dimensionality. Must be a positive integer.
pub fn parse_dimensions(raw: &str) -> Result<usize, DimensionalityError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DimensionalityError(raw.to_string())),
    }
}

/// Builds the index definition from the Azure settings.
pub fn build_index_schema(settings: &AzureSettings) -> Result<IndexSchema, SchemaError> {
    let index_name = required(&settings.index_name, "azure.index_name")?;
    let resource_uri = required(&settings.openai_endpoint, "azure.openai_endpoint")?;
    let api_key = required(&settings.openai_api_key, "azure.openai_api_key")?;
    let model_name = required(&settings.openai_embedding_model, "azure.openai_embedding_model")?;
    let deployment_id = required(
        &settings.openai_embedding_deployment,
        "azure.openai_embedding_deployment",
    )?;
    let raw_dimensions = required(
        &settings.openai_embedding_dimensions,
        "azure.openai_embedding_dimensions",
    )?;
    let dimensions = parse_dimensions(raw_dimensions)?;

    let fields = vec![
        SearchField::simple("id", FieldType::String).key().filterable(),
        SearchField::searchable("manufacturer").filterable().sortable(),
        SearchField::searchable("usga_lot_num").filterable(),
        SearchField::searchable("pole_marking").filterable(),
        SearchField::searchable("colour").filterable(),
        SearchField::searchable("constCode").filterable(),
        SearchField::searchable("ballSpecs").filterable(),
        SearchField::simple("dimples", FieldType::Int32).filterable().sortable(),
        SearchField::searchable("spin").filterable(),
        SearchField::searchable("pole_2").filterable(),
        SearchField::searchable("seam_marking").filterable(),
        SearchField::simple("imageUrl", FieldType::String),
        SearchField::vector(VECTOR_FIELD, dimensions, VECTOR_PROFILE),
    ];

    let vector_search = VectorSearch {
        algorithms: vec![HnswAlgorithm {
            name: HNSW_CONFIG.to_string(),
            kind: "hnsw",
            hnsw_parameters: HnswParameters {
                m: HNSW_M,
                ef_construction: HNSW_EF_CONSTRUCTION,
                ef_search: HNSW_EF_SEARCH,
                metric: HNSW_METRIC,
            },
        }],
        profiles: vec![VectorProfile {
            name: VECTOR_PROFILE.to_string(),
            algorithm: HNSW_CONFIG.to_string(),
            vectorizer: VECTORIZER.to_string(),
        }],
        vectorizers: vec![Vectorizer {
            name: VECTORIZER.to_string(),
            kind: "azureOpenAI",
            azure_openai_parameters: AzureOpenAiParameters {
                resource_uri: resource_uri.to_string(),
                deployment_id: deployment_id.to_string(),
                api_key: api_key.to_string(),
                model_name: model_name.to_string(),
            },
        }],
    };

    let semantic = SemanticSearch {
        configurations: vec![SemanticConfiguration {
            name: SEMANTIC_CONFIG.to_string(),
            prioritized_fields: PrioritizedFields {
                title_field: SemanticField::new("manufacturer"),
                prioritized_content_fields: vec![
                    SemanticField::new("pole_marking"),
                    SemanticField::new("seam_marking"),
                ],
            },
        }],
    };

    Ok(IndexSchema {
        name: index_name.to_string(),
        fields,
        vector_search,
        semantic,
    })
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, SchemaError> {
    config::require(value, key).map_err(|_| SchemaError::MissingSetting(key))
}

#[derive(Debug, thiserror::Error)]
#[error("vector dimensionality {0:?} is not a positive integer")]
pub struct DimensionalityError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error(transparent)]
    Dimensionality(#[from] DimensionalityError),
}
