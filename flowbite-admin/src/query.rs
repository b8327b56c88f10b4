//! Request query parameters
//!
//! Query strings are ordered multi-maps: a key may appear more than once and
//! pair order is preserved. Lookups through [`QueryParams::get`] return the
//! last value, as form binding does.

use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};

/// Page number (1-based)
pub const PAGE_VAR: &str = "p";
/// Show every result on one page
pub const ALL_VAR: &str = "all";
/// Ordering (`o=2.-1`)
pub const ORDER_VAR: &str = "o";
/// Search term
pub const SEARCH_VAR: &str = "q";
/// Set after a redirect caused by bad lookup parameters
pub const ERROR_FLAG: &str = "e";
/// Popup window marker
pub const IS_POPUP_VAR: &str = "_popup";
/// Related-field target of a popup
pub const TO_FIELD_VAR: &str = "_to_field";

/// Keys owned by the list pipeline; never treated as filters.
pub const RESERVED_KEYS: &[&str] = &[
    PAGE_VAR,
    ALL_VAR,
    ORDER_VAR,
    SEARCH_VAR,
    ERROR_FLAG,
    IS_POPUP_VAR,
    TO_FIELD_VAR,
];

/// Whether a key is reserved by the list pipeline.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Ordered, multi-valued query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a form-urlencoded query string, with or without the leading `?`.
    pub fn parse(query: &str) -> AdminResult<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| AdminError::Serialization(e.to_string()))?;
        Ok(Self { pairs })
    }

    /// Build from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Last value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a key, in order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-appearance order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.pairs {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    /// All pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every value of a key with a single value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.remove(&key);
        self.pairs.push((key, value.into()));
    }

    /// Add a value, keeping existing ones
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Remove a key entirely
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Form-urlencoded pairs in their original order, without a leading `?`.
    pub fn urlencode(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}
