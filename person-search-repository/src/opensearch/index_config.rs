//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the person search index.

use serde_json::{json, Value};

/// Configuration for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The alias name for the search index (used for all operations).
    pub alias: String,
    /// The version number for the index (e.g., 0 for "persons_v0").
    pub version: u32,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `alias` - The index alias name
    /// * `version` - The version number
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// The concrete index the alias points at.
    pub fn versioned_index_name(&self) -> String {
        get_versioned_index_name(Some(self.version))
    }
}

/// The base name of the search index (without version).
pub const INDEX_NAME: &str = "persons";

/// Get the versioned index name.
///
/// # Arguments
///
/// * `version` - The version number (defaults to 0 if None)
///
/// # Returns
///
/// The versioned index name (e.g., "persons_v0")
pub fn get_versioned_index_name(version: Option<u32>) -> String {
    let v = version.unwrap_or(0);
    format!("{}_v{}", INDEX_NAME, v)
}

/// Mapping for a categorical field that also supports prefix matching.
///
/// The keyword type is what terms aggregations bucket on; the `autocomplete` sub-field is
/// what the advanced search matches against.
fn keyword_with_autocomplete() -> Value {
    json!({
        "type": "keyword",
        "fields": {
            "autocomplete": {
                "type": "text",
                "analyzer": "autocomplete",
                "search_analyzer": "standard"
            }
        }
    })
}

/// Get the index settings and mappings for the person search index.
///
/// The configuration includes:
/// - **autocomplete analyzer**: lowercase edge n-grams, used by the `*.autocomplete`
///   sub-fields that the advanced search targets
/// - **fulltext**: the derived free-text field of the default search
/// - **keyword fields**: country and city, for the terms aggregation and exact filtering
/// - **dateOfBirth / children**: inputs of the histogram and average aggregations
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
///
/// # Arguments
///
/// * `alias` - Alias to attach to the created index
pub fn get_index_settings(alias: &str) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "filter": {
                    "autocomplete_filter": {
                        "type": "edge_ngram",
                        "min_gram": 1,
                        "max_gram": 20
                    }
                },
                "analyzer": {
                    "autocomplete": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "autocomplete_filter"]
                    }
                }
            }
        },
        "aliases": {
            alias: {}
        },
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "name": {
                    "type": "text",
                    "fields": {
                        "autocomplete": {
                            "type": "text",
                            "analyzer": "autocomplete",
                            "search_analyzer": "standard"
                        }
                    }
                },
                "dateOfBirth": {
                    "type": "date",
                    "format": "yyyy-MM-dd"
                },
                "gender": { "type": "keyword" },
                "children": { "type": "integer" },
                "address": {
                    "properties": {
                        "country": keyword_with_autocomplete(),
                        "countrycode": { "type": "keyword" },
                        "city": keyword_with_autocomplete(),
                        "zipcode": { "type": "keyword" },
                        "location": { "type": "geo_point" }
                    }
                },
                "fulltext": { "type": "text" },
                "indexedAt": { "type": "date" }
            }
        }
    })
}
