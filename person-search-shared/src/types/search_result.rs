//! Search result types.
//!
//! This module defines the response structures returned from search operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::person::Person;

/// A single matched document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The document id (the person's reference).
    pub reference: String,

    /// Relevance score from the search engine, absent when scoring is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// The stored document as returned by the backend.
    pub document: Value,
}

impl SearchHit {
    /// Decode the stored document back into a person.
    pub fn person(&self) -> Result<Person, serde_json::Error> {
        Person::deserialize(&self.document)
    }
}

/// One bucket of a bucket aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    /// The bucket key, formatted by the backend when a format was requested.
    pub key: String,
    pub doc_count: u64,
    /// Results of the sub-aggregations requested for this bucket.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregationResult>,
}

/// Result of one requested aggregation. The tree mirrors the requested plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationResult {
    Buckets { name: String, buckets: Vec<Bucket> },
    Metric { name: String, value: Option<f64> },
}

impl AggregationResult {
    pub fn name(&self) -> &str {
        match self {
            AggregationResult::Buckets { name, .. } | AggregationResult::Metric { name, .. } => {
                name
            }
        }
    }

    /// The buckets of a bucket aggregation; empty for a metric.
    pub fn buckets(&self) -> &[Bucket] {
        match self {
            AggregationResult::Buckets { buckets, .. } => buckets,
            AggregationResult::Metric { .. } => &[],
        }
    }
}

/// Complete search response with hits, total count and aggregations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    /// The page of hits, ordered by relevance.
    pub hits: Vec<SearchHit>,

    /// Total number of matching documents.
    /// May be greater than the number of returned hits due to pagination.
    pub total: u64,

    /// Aggregation results, in the order they were requested.
    #[serde(default)]
    pub aggregations: Vec<AggregationResult>,

    /// Time taken to execute the search in milliseconds.
    pub took_ms: u64,
}

impl SearchResponse {
    /// Create an empty search response.
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            aggregations: Vec::new(),
            took_ms: 0,
        }
    }

    /// Returns true if there are no hits in this page.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits in this page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Look up a top-level aggregation result by name.
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations.iter().find(|a| a.name() == name)
    }
}
