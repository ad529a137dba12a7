//! Vector queries against the golf-ball index.
//!
//! The query text goes to the service as-is; the index's vectorizer embeds it, so no
//! embedding call happens here. Results keep the service's relevance order.

use serde::Serialize;
use serde_json::Value;

use crate::provider::{ProviderError, SearchRow, VectorSearcher};
use crate::record::GolfBall;
use crate::schema::VECTOR_FIELD;

pub const DEFAULT_K: u32 = 3;
pub const DEFAULT_TOP: u32 = 10;

/// Fields returned for every hit.
pub const SELECTED_FIELDS: [&str; 5] = ["id", "manufacturer", "pole_marking", "colour", "seam_marking"];

/// A free-text query plus its search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Nearest neighbors considered by the vector query.
    pub k: u32,
    /// Maximum results returned.
    pub top: u32,
    /// OData filter expression, e.g. `colour eq 'White'`.
    pub filter: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            k: DEFAULT_K,
            top: DEFAULT_TOP,
            filter: None,
        }
    }

    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Body of a `docs/search` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub select: String,
    pub top: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub vector_queries: Vec<VectorQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorQuery {
    pub kind: &'static str,
    pub text: String,
    pub k: u32,
    pub fields: String,
}

/// Validates the query and shapes it into a search request.
pub fn build_search_request(query: &SearchQuery) -> Result<SearchRequest, QueryError> {
    if query.text.trim().is_empty() {
        return Err(QueryError::InvalidQuery("query text is empty".to_string()));
    }
    if query.k == 0 {
        return Err(QueryError::InvalidQuery("k must be at least 1".to_string()));
    }
    if query.top == 0 {
        return Err(QueryError::InvalidQuery("top must be at least 1".to_string()));
    }
    let filter = query
        .filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    Ok(SearchRequest {
        select: SELECTED_FIELDS.join(","),
        top: query.top,
        filter,
        vector_queries: vec![VectorQuery {
            kind: "text",
            text: query.text.clone(),
            k: query.k,
            fields: VECTOR_FIELD.to_string(),
        }],
    })
}

/// Builds a record from one result row. Unselected attributes stay empty, as does the vector.
pub fn map_row(row: &SearchRow) -> Result<GolfBall, QueryError> {
    Ok(GolfBall {
        id: field(row, "id")?,
        manufacturer: field(row, "manufacturer")?,
        pole_marking: field(row, "pole_marking")?,
        colour: field(row, "colour")?,
        seam_marking: field(row, "seam_marking")?,
        ..GolfBall::default()
    })
}

/// Runs `query` and maps each row. Zero hits is an empty vec.
pub async fn run_query<S>(searcher: &S, query: &SearchQuery) -> Result<Vec<GolfBall>, QueryError>
where
    S: VectorSearcher + ?Sized,
{
    let request = build_search_request(query)?;
    tracing::debug!(query = %query.text, k = query.k, top = query.top, "running vector query");
    let rows = searcher.search(&request).await?;
    if rows.is_empty() {
        tracing::debug!(query = %query.text, "no matches");
    }
    rows.iter().map(map_row).collect()
}

fn field(row: &SearchRow, name: &'static str) -> Result<String, QueryError> {
    match row.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Ok(other.to_string()),
        None => Err(QueryError::MissingField(name)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("search failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("result row has no {0:?} field")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(v: Value) -> SearchRow {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn defaults() {
        let q = SearchQuery::new("white balls");
        assert_eq!((q.k, q.top, q.filter), (3, 10, None));
    }

    #[test]
    fn request_shape() {
        let q = SearchQuery::new("Find golf balls with high spin").with_filter("dimples gt 300");
        let body = serde_json::to_value(build_search_request(&q).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "select": "id,manufacturer,pole_marking,colour,seam_marking",
                "top": 10,
                "filter": "dimples gt 300",
                "vectorQueries": [{
                    "kind": "text",
                    "text": "Find golf balls with high spin",
                    "k": 3,
                    "fields": "vectorContent"
                }]
            })
        );
    }

    #[test]
    fn blank_filter_is_dropped() {
        let q = SearchQuery::new("x").with_filter("  ");
        let body = serde_json::to_value(build_search_request(&q).unwrap()).unwrap();
        assert!(body.get("filter").is_none());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(build_search_request(&SearchQuery::new(" ")).is_err());
        assert!(build_search_request(&SearchQuery::new("x").with_k(0)).is_err());
        assert!(build_search_request(&SearchQuery::new("x").with_top(0)).is_err());
    }

    #[test]
    fn maps_selected_fields() {
        let r = row(json!({
            "@search.score": 0.83,
            "id": "abc",
            "manufacturer": "Titleist",
            "pole_marking": "Pro V1",
            "colour": "White",
            "seam_marking": null
        }));
        let ball = map_row(&r).unwrap();
        assert_eq!(ball.id, "abc");
        assert_eq!(ball.manufacturer, "Titleist");
        assert_eq!(ball.pole_marking, "Pro V1");
        assert_eq!(ball.colour, "White");
        assert_eq!(ball.seam_marking, "");
        assert!(ball.vector_content.is_empty());
        assert_eq!(ball.dimples, 0);
    }

    #[test]
    fn missing_field_is_an_error() {
        let r = row(json!({ "id": "abc", "manufacturer": "Titleist" }));
        assert!(matches!(map_row(&r), Err(QueryError::MissingField("pole_marking"))));
    }
}
