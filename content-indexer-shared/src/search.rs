//! Search request parameters and the result shape returned to query callers.

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;

/// Query string that matches every document.
pub const MATCH_ALL: &str = "*";

/// Sort direction. Anything other than `desc` reads as ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A parsed `"field dir"` sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parse `"field dir"`. Returns `None` for a blank expression.
    pub fn parse(sort: &str) -> Option<Self> {
        let mut parts = sort.split_whitespace();
        let field = parts.next()?.to_string();
        let direction = parts.next().map(SortDirection::parse).unwrap_or_default();
        Some(Self { field, direction })
    }
}

/// Parameters of a search against one backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "first_page")]
    pub current_page: u32,
    /// Page size. Falls back to the site's `rows_per_page`.
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub sort: Option<String>,
    /// `field:value` filters, all of which must match.
    #[serde(default)]
    pub filter_queries: Vec<String>,
}

fn first_page() -> u32 {
    1
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            current_page: 1,
            rows: None,
            sort: None,
            filter_queries: Vec::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.current_page = page;
        self
    }

    pub fn with_rows(mut self, rows: u32) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_filter(mut self, field: &str, value: &str) -> Self {
        self.filter_queries.push(format!("{}:{}", field, value));
        self
    }

    pub fn is_match_all(&self) -> bool {
        let query = self.query.trim();
        query.is_empty() || query == MATCH_ALL
    }

    /// 1-based page, treating 0 as the first page.
    pub fn page(&self) -> u32 {
        self.current_page.max(1)
    }

    /// Offset of the first row: `(page - 1) * rows`.
    pub fn start(&self, rows: u32) -> u64 {
        u64::from(self.page() - 1) * u64::from(rows)
    }

    /// Individual query terms, AND-combined by the backends.
    pub fn terms(&self) -> Vec<&str> {
        if self.is_match_all() {
            return Vec::new();
        }
        self.query.split_whitespace().collect()
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort.as_deref().and_then(SortSpec::parse)
    }

    /// Filters split into `(field, value)` pairs. Malformed entries are dropped.
    pub fn filters(&self) -> Vec<(String, String)> {
        self.filter_queries
            .iter()
            .filter_map(|fq| fq.split_once(':'))
            .map(|(field, value)| (field.trim().to_string(), value.trim().to_string()))
            .filter(|(field, _)| !field.is_empty())
            .collect()
    }
}

/// One matched document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Option<String>,
    pub score: Option<f64>,
    #[serde(flatten)]
    pub fields: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellCheck {
    pub corrected: bool,
    pub original_text: String,
    pub corrected_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetValue {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetResult {
    pub name: String,
    pub values: Vec<FacetValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub name: String,
    pub num_found: u64,
    pub results: Vec<SearchHit>,
}

/// Search response handed to the query API.
///
/// Features a backend does not support are present and empty, never omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub num_found: u64,
    pub start: u64,
    pub limit: u32,
    pub page_count: u64,
    pub current_page: u32,
    pub results: Vec<SearchHit>,
    pub q_time: u64,
    pub elapsed_time: u64,
    pub query_string: String,
    pub sort: Option<String>,
    pub spell_check: SpellCheck,
    pub similar_results: Vec<SearchHit>,
    pub facet_results: Vec<FacetResult>,
    pub groups: Vec<GroupResult>,
}

impl SearchResults {
    /// `ceil(num_found / rows)`, zero when `rows` is zero.
    pub fn page_count(num_found: u64, rows: u32) -> u64 {
        if rows == 0 {
            0
        } else {
            num_found.div_ceil(u64::from(rows))
        }
    }
}
