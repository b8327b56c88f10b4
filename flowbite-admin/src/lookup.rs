//! Field-lookup catalog
//!
//! Maps a field's type category to the ordered comparison operators the
//! advanced filter form offers for it, and names the query keys those
//! (field, operator) pairs are exchanged under.

use crate::field::{FieldCategory, FieldDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between a field name and its lookup in ORM lookup strings.
pub const LOOKUP_SEP: &str = "__";

/// Comparison operators offered by the advanced filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupOperator {
    Exact,
    Contains,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
}

const TEXT_LOOKUPS: &[LookupOperator] = &[
    LookupOperator::Contains,
    LookupOperator::IContains,
    LookupOperator::Exact,
];

const NUMERIC_LOOKUPS: &[LookupOperator] = &[
    LookupOperator::Exact,
    LookupOperator::Gt,
    LookupOperator::Gte,
    LookupOperator::Lt,
    LookupOperator::Lte,
];

const TEMPORAL_LOOKUPS: &[LookupOperator] =
    &[LookupOperator::Exact, LookupOperator::Gt, LookupOperator::Lt];

const EXACT_ONLY: &[LookupOperator] = &[LookupOperator::Exact];

impl LookupOperator {
    /// Lookup name as used in ORM lookup strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// Substring operators always compare text.
    pub fn is_containment(&self) -> bool {
        matches!(self, Self::Contains | Self::IContains)
    }
}

impl fmt::Display for LookupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "contains" => Ok(Self::Contains),
            "icontains" => Ok(Self::IContains),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            other => Err(format!("unsupported lookup: {}", other)),
        }
    }
}

impl FieldCategory {
    /// Ordered operators for this category. Never empty, always has `exact`.
    pub fn operators(&self) -> &'static [LookupOperator] {
        match self {
            FieldCategory::Text => TEXT_LOOKUPS,
            FieldCategory::Numeric => NUMERIC_LOOKUPS,
            FieldCategory::Temporal => TEMPORAL_LOOKUPS,
            FieldCategory::Boolean | FieldCategory::Relation | FieldCategory::Other => EXACT_ONLY,
        }
    }
}

/// Permitted operators for a field, in rendering order.
pub fn operators_for(field: &FieldDescriptor) -> &'static [LookupOperator] {
    field.category().operators()
}

/// A (field, operator) pair offered by the advanced filter form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvancedLookup {
    pub field_name: String,
    pub operator: LookupOperator,
}

impl AdvancedLookup {
    pub fn new(field_name: impl Into<String>, operator: LookupOperator) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
        }
    }

    /// ORM lookup string: the bare field for `exact`, else `field__op`.
    pub fn orm_lookup(&self) -> String {
        match self.operator {
            LookupOperator::Exact => self.field_name.clone(),
            op => format!("{}{}{}", self.field_name, LOOKUP_SEP, op),
        }
    }

    /// Query-string key: `prefix + field + "__" + op`, for every operator.
    pub fn query_key(&self, prefix: &str) -> String {
        format!("{}{}{}{}", prefix, self.field_name, LOOKUP_SEP, self.operator)
    }
}

/// Canonical form of a lookup key: a trailing `__exact` is implied.
///
/// `published__exact` and `published` constrain the same thing and normalize
/// to `published`.
pub fn normalize_lookup(key: &str) -> &str {
    key.strip_suffix("__exact").unwrap_or(key)
}

/// Split a lookup key into its field name and (optional) lookup suffix.
///
/// Only the first segment is treated as the field; anything after the last
/// separator is the lookup.
pub fn split_lookup(key: &str) -> (&str, Option<&str>) {
    match key.split_once(LOOKUP_SEP) {
        Some((field, rest)) => {
            let lookup = rest.rsplit(LOOKUP_SEP).next().unwrap_or(rest);
            (field, Some(lookup))
        }
        None => (key, None),
    }
}
