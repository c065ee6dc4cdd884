//! Search query types.
//!
//! This module defines a backend-neutral query tree, the aggregation plan attached to a
//! search, and the pagination window. Rendering into a concrete search-engine dialect is
//! the job of the search index provider.

use serde::{Deserialize, Serialize};

/// A field targeted by a multi-field match, with its relative weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedField {
    pub name: String,
    pub boost: f32,
}

impl WeightedField {
    /// A field at base weight (1.0).
    pub fn new(name: impl Into<String>) -> Self {
        Self::boosted(name, 1.0)
    }

    pub fn boosted(name: impl Into<String>, boost: f32) -> Self {
        Self {
            name: name.into(),
            boost,
        }
    }
}

/// A node of the query tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryClause {
    /// Match every document.
    MatchAll,

    /// Free text matched against several weighted fields. A match on any field counts.
    MultiMatch {
        query: String,
        fields: Vec<WeightedField>,
    },

    /// Conjunction: every clause must match.
    Bool { must: Vec<QueryClause> },

    /// Text matched against a single field.
    Match { field: String, query: String },
}

impl QueryClause {
    /// Validate the clause tree.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            QueryClause::MatchAll => Ok(()),
            QueryClause::MultiMatch { query, fields } => {
                if query.trim().is_empty() {
                    return Err("multi_match query text cannot be empty".to_string());
                }
                if fields.is_empty() {
                    return Err("multi_match requires at least one field".to_string());
                }
                if let Some(field) = fields.iter().find(|f| f.name.is_empty()) {
                    return Err(format!(
                        "multi_match field names cannot be empty (boost {})",
                        field.boost
                    ));
                }
                Ok(())
            }
            QueryClause::Bool { must } => {
                if must.is_empty() {
                    return Err("bool query requires at least one clause".to_string());
                }
                must.iter().try_for_each(QueryClause::validate)
            }
            QueryClause::Match { field, query } => {
                if field.is_empty() {
                    return Err("match field cannot be empty".to_string());
                }
                if query.trim().is_empty() {
                    return Err(format!("match query text for '{}' cannot be empty", field));
                }
                Ok(())
            }
        }
    }
}

/// Bucket width of a date histogram.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistogramInterval {
    /// Fixed width expressed in days.
    Days(u32),
    /// One calendar year per bucket.
    Year,
}

/// An aggregation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// One bucket per distinct value of a categorical field.
    Terms {
        name: String,
        field: String,
        #[serde(default)]
        aggregations: Vec<Aggregation>,
    },

    /// Date buckets of a fixed interval.
    DateHistogram {
        name: String,
        field: String,
        interval: HistogramInterval,
        min_doc_count: u64,
        /// Inclusive bounds the bucket list is extended to, expressed in `format`.
        extended_bounds: Option<(String, String)>,
        format: Option<String>,
        #[serde(default)]
        aggregations: Vec<Aggregation>,
    },

    /// Average of a numeric field.
    Avg { name: String, field: String },
}

impl Aggregation {
    pub fn name(&self) -> &str {
        match self {
            Aggregation::Terms { name, .. }
            | Aggregation::DateHistogram { name, .. }
            | Aggregation::Avg { name, .. } => name,
        }
    }

    /// Sub-aggregations carried by a bucket aggregation. Metrics have none.
    pub fn sub_aggregations(&self) -> &[Aggregation] {
        match self {
            Aggregation::Terms { aggregations, .. }
            | Aggregation::DateHistogram { aggregations, .. } => aggregations,
            Aggregation::Avg { .. } => &[],
        }
    }
}

/// A complete search submission: query tree, pagination window and aggregation plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: QueryClause,

    /// Offset of the first hit to return.
    #[serde(default)]
    pub from: usize,

    /// Maximum number of hits to return. Does not bound the total count.
    #[serde(default = "default_size")]
    pub size: usize,

    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

fn default_size() -> usize {
    10
}

impl SearchRequest {
    /// Create a request for the first page of `query` with no aggregations.
    pub fn new(query: QueryClause) -> Self {
        Self {
            query,
            from: 0,
            size: default_size(),
            aggregations: Vec::new(),
        }
    }

    /// Set the pagination window.
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// Set the aggregation plan.
    pub fn with_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.aggregations = aggregations;
        self
    }

    /// Validate the query tree and the aggregation names.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        self.query.validate()?;
        validate_aggregations(&self.aggregations)
    }
}

fn validate_aggregations(aggregations: &[Aggregation]) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for aggregation in aggregations {
        if aggregation.name().is_empty() {
            return Err("aggregation names cannot be empty".to_string());
        }
        if !seen.insert(aggregation.name()) {
            return Err(format!(
                "duplicate aggregation name '{}' at the same level",
                aggregation.name()
            ));
        }
        validate_aggregations(aggregation.sub_aggregations())?;
    }
    Ok(())
}
