//! OpenSearch index settings and mappings.
//!
//! Content documents carry arbitrary attributes, so only the fields the
//! pipeline filters on get explicit mappings; everything else is mapped
//! dynamically.

use serde_json::{json, Value};

/// Keyword subfield added to every dynamically mapped string.
pub const RAW_SUBFIELD: &str = "raw";

/// Fields with an explicit non-text mapping.
pub const MAPPED_FIELDS: &[(&str, &str)] = &[
    ("id", "keyword"),
    ("type", "keyword"),
    ("source_apps", "keyword"),
    ("modification_date", "date"),
    ("publication_date", "date"),
];

/// Field name to use for exact matching and sorting on `field`.
///
/// Dynamic strings are analyzed `text`, so `term` and `sort` have to go
/// through their keyword subfield.
pub fn exact_field(field: &str) -> String {
    if MAPPED_FIELDS.iter().any(|(name, _)| *name == field) {
        field.to_string()
    } else {
        format!("{}.{}", field, RAW_SUBFIELD)
    }
}

/// Settings used when an index is created on first connect.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub name: String,
    pub shards: u32,
    pub replicas: u32,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: 1,
            replicas: 1,
        }
    }

    /// Settings and mappings body for index creation.
    ///
    /// - `id`, `type` and `source_apps` are `keyword` so `term` filters and
    ///   delete-by-type match exactly
    /// - string attributes default to `text` with a `keyword` subfield
    pub fn index_settings(&self) -> Value {
        let properties: serde_json::Map<String, Value> = MAPPED_FIELDS
            .iter()
            .map(|(name, kind)| (name.to_string(), json!({ "type": kind })))
            .collect();

        json!({
            "settings": {
                "number_of_shards": self.shards,
                "number_of_replicas": self.replicas
            },
            "mappings": {
                "dynamic_templates": [
                    {
                        "strings": {
                            "match_mapping_type": "string",
                            "mapping": {
                                "type": "text",
                                "fields": {
                                    RAW_SUBFIELD: { "type": "keyword", "ignore_above": 256 }
                                }
                            }
                        }
                    }
                ],
                "properties": properties
            }
        })
    }
}
