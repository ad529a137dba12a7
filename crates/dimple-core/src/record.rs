//! One golf ball from the catalog, in the shape the search index stores it.
//!
//! Field names on the wire match the index definition in [crate::schema].

use serde::{Deserialize, Serialize};

/// A catalog item plus its embedding vector.
///
/// The loader creates it with an empty vector; ingestion attaches the vector once
/// before upload. Records built from query results never carry a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GolfBall {
    pub id: String,
    pub manufacturer: String,
    pub usga_lot_num: String,
    pub pole_marking: String,
    pub colour: String,
    #[serde(rename = "constCode")]
    pub const_code: String,
    #[serde(rename = "ballSpecs")]
    pub ball_specs: String,
    pub dimples: u32,
    pub spin: String,
    pub pole_2: String,
    pub seam_marking: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(
        rename = "vectorContent",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub vector_content: Vec<f32>,
}

impl GolfBall {
    /// Fresh id for a record that arrived without one.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl Default for GolfBall {
    fn default() -> Self {
        Self {
            id: Self::generate_id(),
            manufacturer: String::new(),
            usga_lot_num: String::new(),
            pole_marking: String::new(),
            colour: String::new(),
            const_code: String::new(),
            ball_specs: String::new(),
            dimples: 0,
            spin: String::new(),
            pole_2: String::new(),
            seam_marking: String::new(),
            image_url: String::new(),
            vector_content: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_are_unique() {
        let a = GolfBall::default();
        let b = GolfBall::default();
        assert_ne!(a.id, b.id);
        assert!(a.vector_content.is_empty());
    }

    #[test]
    fn serializes_with_index_field_names() {
        let ball = GolfBall {
            id: "1".into(),
            const_code: "C1".into(),
            ball_specs: "Spec1".into(),
            image_url: "http://img".into(),
            vector_content: vec![0.5],
            ..GolfBall::default()
        };
        let v = serde_json::to_value(&ball).unwrap();
        assert_eq!(v["constCode"], "C1");
        assert_eq!(v["ballSpecs"], "Spec1");
        assert_eq!(v["imageUrl"], "http://img");
        assert_eq!(v["vectorContent"][0], 0.5);
    }

    #[test]
    fn empty_vector_is_not_serialized() {
        let v = serde_json::to_value(GolfBall::default()).unwrap();
        assert!(v.get("vectorContent").is_none());
    }
}
