//! Rendering of backend-neutral queries into the OpenSearch query DSL.

use person_search_shared::{Aggregation, HistogramInterval, QueryClause, SearchRequest};
use serde_json::{json, Map, Value};

/// Render a query clause.
pub fn render_query(clause: &QueryClause) -> Value {
    match clause {
        QueryClause::MatchAll => json!({ "match_all": {} }),
        QueryClause::MultiMatch { query, fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|f| {
                    if f.boost == 1.0 {
                        f.name.clone()
                    } else {
                        format!("{}^{}", f.name, f.boost)
                    }
                })
                .collect();
            json!({
                "multi_match": {
                    "query": query,
                    "fields": fields
                }
            })
        }
        QueryClause::Bool { must } => {
            let must: Vec<Value> = must.iter().map(render_query).collect();
            json!({ "bool": { "must": must } })
        }
        QueryClause::Match { field, query } => {
            let mut inner = Map::new();
            inner.insert(field.clone(), json!({ "query": query }));
            json!({ "match": inner })
        }
    }
}

/// Render an aggregation plan into an `aggs` object.
pub fn render_aggregations(aggregations: &[Aggregation]) -> Value {
    let mut aggs = Map::new();
    for aggregation in aggregations {
        aggs.insert(aggregation.name().to_string(), render_aggregation(aggregation));
    }
    Value::Object(aggs)
}

fn render_aggregation(aggregation: &Aggregation) -> Value {
    let mut rendered = match aggregation {
        Aggregation::Terms { field, .. } => json!({ "terms": { "field": field } }),
        Aggregation::DateHistogram {
            field,
            interval,
            min_doc_count,
            extended_bounds,
            format,
            ..
        } => {
            let mut histogram = Map::new();
            histogram.insert("field".to_string(), json!(field));
            match interval {
                HistogramInterval::Days(days) => {
                    histogram.insert("fixed_interval".to_string(), json!(format!("{}d", days)));
                }
                HistogramInterval::Year => {
                    histogram.insert("calendar_interval".to_string(), json!("year"));
                }
            }
            histogram.insert("min_doc_count".to_string(), json!(min_doc_count));
            if let Some((min, max)) = extended_bounds {
                histogram.insert("extended_bounds".to_string(), json!({ "min": min, "max": max }));
            }
            if let Some(format) = format {
                histogram.insert("format".to_string(), json!(format));
            }
            json!({ "date_histogram": histogram })
        }
        Aggregation::Avg { field, .. } => json!({ "avg": { "field": field } }),
    };

    let sub = aggregation.sub_aggregations();
    if !sub.is_empty() {
        rendered["aggs"] = render_aggregations(sub);
    }
    rendered
}

/// Render the full search body: query, pagination window and aggregations.
///
/// `track_total_hits` is always on so the total reflects every match, not just the
/// backend's default counting window.
pub fn render_search_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "query": render_query(&request.query),
        "from": request.from,
        "size": request.size,
        "track_total_hits": true
    });
    if !request.aggregations.is_empty() {
        body["aggs"] = render_aggregations(&request.aggregations);
    }
    body
}
