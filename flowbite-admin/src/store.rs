//! Query-layer interface
//!
//! The admin never talks to a database directly. A [`QueryBackend`] receives
//! an AND-combination of lookups, an optional search and an ordering, and
//! answers with a count or a page of rows.

use crate::error::AdminResult;
use crate::forms::FilterValue;
use crate::model::{ModelDefinition, OrderingField};
use serde::{Deserialize, Serialize};

/// One fetched row: column name -> JSON value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Lookup names a backend must understand
pub const SUPPORTED_LOOKUPS: &[&str] = &[
    "exact",
    "iexact",
    "contains",
    "icontains",
    "gt",
    "gte",
    "lt",
    "lte",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
    "in",
    "isnull",
];

/// `lookup` matches any of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// ORM lookup (`title__contains`, `published`)
    pub lookup: String,
    pub values: Vec<FilterValue>,
}

impl FilterClause {
    pub fn new(lookup: impl Into<String>, values: Vec<FilterValue>) -> Self {
        Self {
            lookup: lookup.into(),
            values,
        }
    }
}

/// Every term must occur (case-insensitively) in at least one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchClause {
    pub fields: Vec<String>,
    pub terms: Vec<String>,
}

impl SearchClause {
    /// Split a search box value into terms; `None` when nothing to search.
    pub fn new(fields: &[String], query: &str) -> Option<Self> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_string).collect();
        if fields.is_empty() || terms.is_empty() {
            return None;
        }
        Some(Self {
            fields: fields.to_vec(),
            terms,
        })
    }
}

/// A row-set request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowQuery {
    /// AND-combined lookups
    pub filters: Vec<FilterClause>,
    pub search: Option<SearchClause>,
    pub ordering: Vec<OrderingField>,
    pub offset: usize,
    /// `None` fetches every remaining row
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same constraints, no ordering or window
    pub fn for_count(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            search: self.search.clone(),
            ..Self::default()
        }
    }
}

/// Persistence collaborator
pub trait QueryBackend: Send + Sync {
    /// Number of rows matching the query's constraints.
    fn count(&self, model: &ModelDefinition, query: &RowQuery) -> AdminResult<usize>;

    /// Ordered, windowed rows matching the query.
    fn fetch(&self, model: &ModelDefinition, query: &RowQuery) -> AdminResult<Vec<Row>>;
}

/// Render a stored value for display and URLs.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
