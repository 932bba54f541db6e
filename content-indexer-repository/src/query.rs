//! Engine-neutral query translation.
//!
//! [`SearchParams`] coming from callers are translated once into a
//! [`BackendQuery`]; each driver renders that into its own wire format and
//! answers with a [`BackendResponse`], which is shaped into the public
//! [`SearchResults`].

use std::time::Duration;

use content_indexer_shared::{SearchHit, SearchParams, SearchResults, SortSpec};

/// A query every driver knows how to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendQuery {
    /// Full-text terms, AND-combined. Empty means match-all.
    pub terms: Vec<String>,
    /// Exact `field == value` filters, all of which must match.
    pub filters: Vec<(String, String)>,
    pub start: u64,
    pub rows: u32,
    pub sort: Option<SortSpec>,
}

impl BackendQuery {
    /// Translate caller parameters. `default_rows` applies when the caller
    /// gave no page size.
    pub fn translate(params: &SearchParams, default_rows: u32) -> Self {
        let rows = params.rows.filter(|rows| *rows > 0).unwrap_or(default_rows);

        Self {
            terms: params.terms().into_iter().map(str::to_string).collect(),
            filters: params.filters(),
            start: params.start(rows),
            rows,
            sort: params.sort_spec(),
        }
    }

    /// A single-document lookup by exact field values.
    pub fn lookup(filters: Vec<(String, String)>) -> Self {
        Self {
            terms: Vec::new(),
            filters,
            start: 0,
            rows: 1,
            sort: None,
        }
    }

    pub fn is_match_all(&self) -> bool {
        self.terms.is_empty()
    }

    /// The terms joined back into a query string (`*` for match-all).
    pub fn query_string(&self) -> String {
        if self.is_match_all() {
            content_indexer_shared::MATCH_ALL.to_string()
        } else {
            self.terms.join(" ")
        }
    }
}

/// Raw answer from a driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub num_found: u64,
    /// Time the engine reports spending on the query, in milliseconds.
    pub q_time: u64,
    pub hits: Vec<SearchHit>,
}

/// Build the public result shape. Spellcheck, facets, groups and similar
/// results are left empty.
pub fn shape_results(
    params: &SearchParams,
    query: &BackendQuery,
    response: BackendResponse,
    elapsed: Duration,
) -> SearchResults {
    SearchResults {
        num_found: response.num_found,
        start: query.start,
        limit: query.rows,
        page_count: SearchResults::page_count(response.num_found, query.rows),
        current_page: params.page(),
        results: response.hits,
        q_time: response.q_time,
        elapsed_time: elapsed.as_millis() as u64,
        query_string: params.query.clone(),
        sort: params.sort.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_indexer_shared::SortDirection;

    #[test]
    fn test_translate_match_all() {
        let query = BackendQuery::translate(&SearchParams::new("*"), 10);

        assert!(query.is_match_all());
        assert_eq!(query.query_string(), "*");
        assert_eq!(query.rows, 10);
        assert_eq!(query.start, 0);
    }

    #[test]
    fn test_translate_terms_and_paging() {
        let params = SearchParams::new("open source  search")
            .with_page(3)
            .with_rows(20)
            .with_sort("modified_date desc");
        let query = BackendQuery::translate(&params, 10);

        assert_eq!(query.terms, vec!["open", "source", "search"]);
        assert_eq!(query.start, 40);
        assert_eq!(query.rows, 20);
        assert_eq!(query.sort.unwrap().direction, SortDirection::Desc);
    }

    #[test]
    fn test_zero_rows_falls_back_to_default() {
        let query = BackendQuery::translate(&SearchParams::new("x").with_rows(0), 15);
        assert_eq!(query.rows, 15);
    }

    #[test]
    fn test_shape_results() {
        let params = SearchParams::new("rust").with_page(2).with_rows(10);
        let query = BackendQuery::translate(&params, 10);
        let response = BackendResponse {
            num_found: 25,
            q_time: 3,
            hits: vec![SearchHit::default(); 10],
        };

        let results = shape_results(&params, &query, response, Duration::from_millis(12));

        assert_eq!(results.num_found, 25);
        assert_eq!(results.start, 10);
        assert_eq!(results.limit, 10);
        assert_eq!(results.page_count, 3);
        assert_eq!(results.current_page, 2);
        assert_eq!(results.results.len(), 10);
        assert_eq!(results.q_time, 3);
        assert_eq!(results.elapsed_time, 12);
        assert_eq!(results.query_string, "rust");
        assert!(results.facet_results.is_empty());
        assert!(results.groups.is_empty());
    }
}
