//! Solr request parameters and response parsing.

use serde_json::Value;

use crate::errors::SearchError;
use crate::query::{BackendQuery, BackendResponse};
use content_indexer_shared::{Attributes, SearchHit, TYPE_ATTRIBUTE};

const MATCH_ALL_QUERY: &str = "*:*";

/// Fields Solr adds to every returned document.
const INTERNAL_FIELDS: &[&str] = &["_version_", "score"];

/// Quote a value for use inside a Solr query.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Delete-by-query expression matching every document of one type.
pub fn type_query(doc_type: &str) -> String {
    format!("{}:{}", TYPE_ATTRIBUTE, quote(doc_type))
}

/// Escape Solr query syntax in a single term.
fn escape_term(term: &str) -> String {
    const RESERVED: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
        '/',
    ];
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `/select` parameters for a translated query.
pub fn select_params(query: &BackendQuery) -> Vec<(String, String)> {
    let q = if query.is_match_all() {
        MATCH_ALL_QUERY.to_string()
    } else {
        query
            .terms
            .iter()
            .map(|t| escape_term(t))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut params = vec![
        ("q".to_string(), q),
        ("q.op".to_string(), "AND".to_string()),
        ("start".to_string(), query.start.to_string()),
        ("rows".to_string(), query.rows.to_string()),
        ("fl".to_string(), "*,score".to_string()),
        ("wt".to_string(), "json".to_string()),
    ];

    for (field, value) in &query.filters {
        params.push(("fq".to_string(), format!("{}:{}", field, quote(value))));
    }

    if let Some(sort) = &query.sort {
        params.push((
            "sort".to_string(),
            format!("{} {}", sort.field, sort.direction.as_str()),
        ));
    }

    params
}

fn parse_doc(doc: &Value) -> Result<SearchHit, SearchError> {
    let source = doc
        .as_object()
        .ok_or_else(|| SearchError::parse("document is not an object"))?;

    let score = source.get("score").and_then(Value::as_f64);
    let mut fields = Attributes::from_json_map(source.clone());
    for field in INTERNAL_FIELDS {
        fields.remove(field);
    }

    Ok(SearchHit {
        id: fields.document_id(),
        score,
        fields,
    })
}

/// Parse a `/select` response body.
pub fn parse_response(body: &Value) -> Result<BackendResponse, SearchError> {
    let docs = body
        .pointer("/response/docs")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::parse("response has no docs"))?;

    Ok(BackendResponse {
        num_found: body
            .pointer("/response/numFound")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        q_time: body
            .pointer("/responseHeader/QTime")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        hits: docs.iter().map(parse_doc).collect::<Result<_, _>>()?,
    })
}
