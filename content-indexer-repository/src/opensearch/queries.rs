//! OpenSearch query builders and response parsing.
//!
//! Translates a [`BackendQuery`] into a search request body and reads
//! `hits` back into [`SearchHit`]s.

use serde_json::{json, Value};

use crate::errors::SearchError;
use crate::opensearch::index_config::exact_field;
use crate::query::{BackendQuery, BackendResponse};
use content_indexer_shared::{Attributes, SearchHit, TYPE_ATTRIBUTE};

/// Build the search request body.
///
/// Terms are AND-combined in a `query_string` over every field. Filters
/// become `term` clauses in filter context and do not affect scoring.
/// Filters and sort address the exact-match form of each field.
pub fn build_search_body(query: &BackendQuery) -> Value {
    let must = if query.is_match_all() {
        json!({ "match_all": {} })
    } else {
        json!({
            "query_string": {
                "query": escape_terms(&query.terms),
                "default_operator": "AND"
            }
        })
    };

    let filter: Vec<Value> = query
        .filters
        .iter()
        .map(|(field, value)| json!({ "term": { exact_field(field): value } }))
        .collect();

    let mut body = json!({
        "from": query.start,
        "size": query.rows,
        "track_total_hits": true,
        "query": {
            "bool": {
                "must": [must],
                "filter": filter
            }
        }
    });

    if let Some(sort) = &query.sort {
        body["sort"] = json!([{ exact_field(&sort.field): { "order": sort.direction.as_str() } }]);
    }

    body
}

/// Query removing every document of one type.
pub fn build_delete_by_type(doc_type: &str) -> Value {
    json!({
        "query": {
            "term": { TYPE_ATTRIBUTE: doc_type }
        }
    })
}

/// Escape query-string syntax in each term so user input is matched literally.
fn escape_terms(terms: &[String]) -> String {
    const RESERVED: &[char] = &[
        '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*',
        '?', ':', '\\', '/',
    ];

    terms
        .iter()
        .map(|term| {
            let mut escaped = String::with_capacity(term.len());
            for c in term.chars() {
                if RESERVED.contains(&c) {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a single search hit.
pub fn parse_hit(hit: &Value) -> Result<SearchHit, SearchError> {
    let source = hit
        .get("_source")
        .and_then(Value::as_object)
        .ok_or_else(|| SearchError::parse("hit has no _source"))?;

    let fields = Attributes::from_json_map(source.clone());
    let id = fields
        .document_id()
        .or_else(|| hit.get("_id").and_then(Value::as_str).map(str::to_string));

    Ok(SearchHit {
        id,
        score: hit.get("_score").and_then(Value::as_f64),
        fields,
    })
}

/// Parse a full search response body.
pub fn parse_response(body: &Value) -> Result<BackendResponse, SearchError> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("response has no hits"))?;

    let num_found = match body.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(total) => total
            .get("value")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        None => hits.len() as u64,
    };

    Ok(BackendResponse {
        num_found,
        q_time: body.get("took").and_then(Value::as_u64).unwrap_or_default(),
        hits: hits.iter().map(parse_hit).collect::<Result<_, _>>()?,
    })
}
