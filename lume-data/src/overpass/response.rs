//! Overpass JSON response types.
//!
//! See: <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL#JSON_(JavaScript_Object_Notation)>

use std::collections::HashMap;

use serde::Deserialize;

/// Overpass interpreter response for `[out:json]` queries.
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    /// Matched elements in output order.
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// A node, way or relation. Only the tags matter here.
#[derive(Debug, Deserialize)]
pub struct Element {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl OverpassResponse {
    /// Name of the first element carrying a non-empty `name` tag.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.elements.iter().find_map(|element| {
            element
                .tags
                .get("name")
                .map(String::as_str)
                .filter(|name| !name.trim().is_empty())
        })
    }
}
