//! Parsing of OpenSearch bulk and search responses.

use person_search_shared::{
    Aggregation, AggregationResult, Bucket, IndexOperation, OperationKind, SearchHit,
    SearchRequest, SearchResponse,
};
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{BatchOperationResult, BatchOperationSummary};

/// Map the `items` of a bulk response back onto the submitted operations.
///
/// Items are returned in submission order. A delete answered with 404 is a success: the
/// document is gone either way. Operations the backend did not report on are counted as
/// failed.
pub fn parse_bulk_response(
    operations: &[IndexOperation],
    body: &Value,
) -> Result<BatchOperationSummary, SearchIndexError> {
    let items = body["items"]
        .as_array()
        .ok_or_else(|| SearchIndexError::parse("bulk response has no items array"))?;

    let results = operations
        .iter()
        .enumerate()
        .map(|(i, operation)| match items.get(i) {
            Some(item) => item_result(operation, item),
            None => BatchOperationResult::failed(
                operation,
                SearchIndexError::bulk_index("no item returned for operation"),
            ),
        })
        .collect();

    Ok(BatchOperationSummary::from_results(results))
}

fn item_result(operation: &IndexOperation, item: &Value) -> BatchOperationResult {
    // Each item is a single-key object: {"index": {...}} or {"delete": {...}}
    let detail = item
        .as_object()
        .and_then(|o| o.values().next())
        .cloned()
        .unwrap_or(Value::Null);

    let status = detail["status"].as_u64().unwrap_or(0);
    let ok = (200..300).contains(&status)
        || (operation.kind() == OperationKind::Delete && status == 404);

    if ok {
        return BatchOperationResult::succeeded(operation);
    }

    let reason = match &detail["error"] {
        Value::Null => format!("status {}", status),
        Value::Object(error) => format!(
            "status {}: {} ({})",
            status,
            error
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason"),
            error.get("type").and_then(Value::as_str).unwrap_or("unknown type"),
        ),
        other => format!("status {}: {}", status, other),
    };

    let error = match operation.kind() {
        OperationKind::Upsert => SearchIndexError::index(reason),
        OperationKind::Delete => SearchIndexError::delete(reason),
    };
    BatchOperationResult::failed(operation, error)
}

/// Parse a search response body, shaping the aggregations after the requested plan.
pub fn parse_search_response(
    request: &SearchRequest,
    body: &Value,
) -> Result<SearchResponse, SearchIndexError> {
    let hits_section = body
        .get("hits")
        .ok_or_else(|| SearchIndexError::parse("search response has no hits section"))?;

    // `hits.total` is an object ({"value": n, "relation": "eq"}) on recent versions and a
    // plain number on older ones.
    let total = match &hits_section["total"] {
        Value::Number(n) => n.as_u64(),
        Value::Object(o) => o.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| SearchIndexError::parse("search response has no total hit count"))?;

    let hits = hits_section["hits"]
        .as_array()
        .map(|hits| hits.iter().map(parse_hit).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let aggregations = parse_aggregations(&request.aggregations, &body["aggregations"]);

    Ok(SearchResponse {
        hits,
        total,
        aggregations,
        took_ms: body["took"].as_u64().unwrap_or(0),
    })
}

fn parse_hit(hit: &Value) -> Result<SearchHit, SearchIndexError> {
    let reference = hit["_id"]
        .as_str()
        .ok_or_else(|| SearchIndexError::parse("search hit has no _id"))?
        .to_string();

    Ok(SearchHit {
        reference,
        score: hit["_score"].as_f64(),
        document: hit["_source"].clone(),
    })
}

/// Walk the requested plan and pick each aggregation out of `raw`.
///
/// A requested aggregation missing from the response yields no buckets (or no value).
fn parse_aggregations(plan: &[Aggregation], raw: &Value) -> Vec<AggregationResult> {
    plan.iter()
        .map(|aggregation| {
            let section = &raw[aggregation.name()];
            match aggregation {
                Aggregation::Avg { name, .. } => AggregationResult::Metric {
                    name: name.clone(),
                    value: section["value"].as_f64(),
                },
                Aggregation::Terms { name, .. } | Aggregation::DateHistogram { name, .. } => {
                    let buckets = section["buckets"]
                        .as_array()
                        .map(|buckets| {
                            buckets
                                .iter()
                                .map(|b| parse_bucket(aggregation.sub_aggregations(), b))
                                .collect()
                        })
                        .unwrap_or_default();
                    AggregationResult::Buckets {
                        name: name.clone(),
                        buckets,
                    }
                }
            }
        })
        .collect()
}

fn parse_bucket(sub_plan: &[Aggregation], bucket: &Value) -> Bucket {
    let key = match (&bucket["key_as_string"], &bucket["key"]) {
        (Value::String(formatted), _) => formatted.clone(),
        (_, Value::String(key)) => key.clone(),
        (_, Value::Null) => String::new(),
        (_, key) => key.to_string(),
    };

    Bucket {
        key,
        doc_count: bucket["doc_count"].as_u64().unwrap_or(0),
        aggregations: parse_aggregations(sub_plan, bucket),
    }
}
