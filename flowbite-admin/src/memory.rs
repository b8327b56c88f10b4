//! In-memory collaborators
//!
//! [`MemoryBackend`] evaluates [`RowQuery`]s over JSON rows and
//! [`MemoryActivity`] serves account and admin-log statistics. Both are used
//! by the test suites and are handy for demos.

use crate::dashboard::{DashboardSource, LogEntry, LogQuery, UserFilter};
use crate::error::{AdminError, AdminResult};
use crate::field::{FieldCategory, FieldDescriptor};
use crate::forms::FilterValue;
use crate::lookup::split_lookup;
use crate::model::ModelDefinition;
use crate::store::{FilterClause, QueryBackend, Row, RowQuery, SUPPORTED_LOOKUPS, display_value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Rows per model label, kept in insertion order
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row (a JSON object) to a model's table.
    pub fn insert(&self, model_label: &str, row: Value) -> AdminResult<()> {
        let Value::Object(row) = row else {
            return Err(AdminError::Validation(format!(
                "row for {} must be a JSON object",
                model_label
            )));
        };
        self.tables
            .write()
            .entry(model_label.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    /// Make every query on a table fail, as an unreachable table would.
    pub fn fail_table(&self, model_label: &str) {
        self.failing.write().insert(model_label.to_string());
    }

    pub fn len(&self, model_label: &str) -> usize {
        self.tables
            .read()
            .get(model_label)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn matching(&self, model: &ModelDefinition, query: &RowQuery) -> AdminResult<Vec<Row>> {
        let label = model.label();
        if self.failing.read().contains(&label) {
            return Err(AdminError::Store(format!("table {} is unavailable", label)));
        }

        let tables = self.tables.read();
        let rows = tables.get(&label).map(Vec::as_slice).unwrap_or(&[]);
        let mut matched = Vec::new();
        for row in rows {
            if matches_row(model, row, query)? {
                matched.push(row.clone());
            }
        }
        Ok(matched)
    }
}

impl QueryBackend for MemoryBackend {
    fn count(&self, model: &ModelDefinition, query: &RowQuery) -> AdminResult<usize> {
        Ok(self.matching(model, query)?.len())
    }

    fn fetch(&self, model: &ModelDefinition, query: &RowQuery) -> AdminResult<Vec<Row>> {
        let mut rows = self.matching(model, query)?;

        if !query.ordering.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .ordering
                    .iter()
                    .map(|order| {
                        let name = resolve_column(model, &order.field);
                        let ord = compare_json(
                            a.get(name).unwrap_or(&Value::Null),
                            b.get(name).unwrap_or(&Value::Null),
                        );
                        if order.descending { ord.reverse() } else { ord }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let rows = rows.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }
}

fn resolve_column<'a>(model: &'a ModelDefinition, name: &'a str) -> &'a str {
    if name == "pk" { &model.primary_key } else { name }
}

fn matches_row(model: &ModelDefinition, row: &Row, query: &RowQuery) -> AdminResult<bool> {
    for clause in &query.filters {
        if !matches_clause(model, row, clause)? {
            return Ok(false);
        }
    }

    if let Some(search) = &query.search {
        let haystacks: Vec<String> = search
            .fields
            .iter()
            .map(|f| {
                row.get(resolve_column(model, f))
                    .map(display_value)
                    .unwrap_or_default()
                    .to_lowercase()
            })
            .collect();
        let all_terms = search.terms.iter().all(|term| {
            let term = term.to_lowercase();
            haystacks.iter().any(|h| h.contains(&term))
        });
        if !all_terms {
            return Ok(false);
        }
    }

    Ok(true)
}

fn matches_clause(model: &ModelDefinition, row: &Row, clause: &FilterClause) -> AdminResult<bool> {
    let (field_name, lookup) = split_lookup(&clause.lookup);
    let field = model
        .get_field(field_name)
        .ok_or_else(|| AdminError::Store(format!("unknown field: {}", field_name)))?;
    // rows hold the related pk, so `author__id` compares the stored key
    let lookup = match lookup {
        None => "exact",
        Some(lookup) if SUPPORTED_LOOKUPS.contains(&lookup) => lookup,
        Some(_) if field.category() == FieldCategory::Relation => "exact",
        Some(_) => {
            return Err(AdminError::Store(format!("unsupported lookup: {}", clause.lookup)));
        }
    };
    let stored = row.get(&field.name).unwrap_or(&Value::Null);

    // values of one key are OR-ed
    Ok(clause
        .values
        .iter()
        .any(|value| matches_value(field, stored, lookup, value)))
}

fn truthy(value: &FilterValue) -> bool {
    match value {
        FilterValue::Bool(b) => *b,
        other => matches!(other.to_query_value().as_str(), "1" | "true" | "True"),
    }
}

fn matches_value(field: &FieldDescriptor, stored: &Value, lookup: &str, value: &FilterValue) -> bool {
    if lookup == "isnull" {
        return stored.is_null() == truthy(value);
    }
    if stored.is_null() {
        return false;
    }

    let text = display_value(stored);
    let needle = value.to_query_value();
    match lookup {
        "exact" => compare(field, stored, value) == Some(Ordering::Equal),
        "iexact" => text.to_lowercase() == needle.to_lowercase(),
        "contains" => text.contains(&needle),
        "icontains" => text.to_lowercase().contains(&needle.to_lowercase()),
        "startswith" => text.starts_with(&needle),
        "istartswith" => text.to_lowercase().starts_with(&needle.to_lowercase()),
        "endswith" => text.ends_with(&needle),
        "iendswith" => text.to_lowercase().ends_with(&needle.to_lowercase()),
        "in" => needle.split(',').any(|item| {
            compare(field, stored, &FilterValue::Text(item.trim().to_string())) == Some(Ordering::Equal)
        }),
        "gt" => compare(field, stored, value) == Some(Ordering::Greater),
        "gte" => matches!(compare(field, stored, value), Some(Ordering::Greater | Ordering::Equal)),
        "lt" => compare(field, stored, value) == Some(Ordering::Less),
        "lte" => matches!(compare(field, stored, value), Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

/// Compare a stored value with a filter value, coercing the filter value to
/// the stored value's shape.
fn compare(field: &FieldDescriptor, stored: &Value, value: &FilterValue) -> Option<Ordering> {
    match stored {
        Value::Bool(b) => {
            let other = match value {
                FilterValue::Bool(v) => *v,
                other => match other.to_query_value().as_str() {
                    "1" | "true" | "True" => true,
                    "0" | "false" | "False" => false,
                    _ => return None,
                },
            };
            Some(b.cmp(&other))
        }
        Value::Number(n) => {
            let left = n.as_f64()?;
            let right: f64 = match value {
                FilterValue::Integer(i) => *i as f64,
                FilterValue::Float(f) => *f,
                other => other.to_query_value().trim().parse().ok()?,
            };
            left.partial_cmp(&right)
        }
        Value::String(s) if field.category() == FieldCategory::Temporal => {
            compare_temporal(s, &value.to_query_value())
        }
        Value::String(s) => Some(s.as_str().cmp(value.to_query_value().as_str())),
        other => Some(other.to_string().cmp(&value.to_json().to_string())),
    }
}

fn compare_temporal(left: &str, right: &str) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (parse_datetime(left), parse_datetime(right)) {
        return Some(l.cmp(&r));
    }
    let (l, r) = (parse_time(left)?, parse_time(right)?);
    Some(l.cmp(&r))
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// Total order over stored values: nulls first, then numbers, then text.
fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => display_value(x).cmp(&display_value(y)),
    }
}

/// Account record served by [`MemoryActivity`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_staff: false,
            last_login: None,
            date_joined: None,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn last_login(mut self, at: DateTime<Utc>) -> Self {
        self.last_login = Some(at);
        self
    }

    pub fn joined(mut self, at: DateTime<Utc>) -> Self {
        self.date_joined = Some(at);
        self
    }
}

/// Accounts and admin log held in memory
#[derive(Debug)]
pub struct MemoryActivity {
    users: RwLock<Vec<UserRecord>>,
    log: RwLock<Vec<LogEntry>>,
    tracks_last_login: bool,
    tracks_date_joined: bool,
}

impl Default for MemoryActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryActivity {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            log: RwLock::new(Vec::new()),
            tracks_last_login: true,
            tracks_date_joined: true,
        }
    }

    /// Accounts without last-login / join-date columns
    pub fn without_user_timestamps(mut self) -> Self {
        self.tracks_last_login = false;
        self.tracks_date_joined = false;
        self
    }

    pub fn add_user(&self, user: UserRecord) {
        self.users.write().push(user);
    }

    pub fn log(&self, entry: LogEntry) {
        self.log.write().push(entry);
    }
}

fn in_range(at: Option<DateTime<Utc>>, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
    match at {
        Some(at) => at >= start && end.is_none_or(|end| at < end),
        None => false,
    }
}

impl DashboardSource for MemoryActivity {
    fn tracks_last_login(&self) -> bool {
        self.tracks_last_login
    }

    fn tracks_date_joined(&self) -> bool {
        self.tracks_date_joined
    }

    fn count_users(&self, filter: &UserFilter) -> AdminResult<usize> {
        let users = self.users.read();
        Ok(users
            .iter()
            .filter(|user| match filter {
                UserFilter::All => true,
                UserFilter::Staff => user.is_staff,
                UserFilter::LoggedInBetween { start, end } => in_range(user.last_login, *start, *end),
                UserFilter::JoinedBetween { start, end } => in_range(user.date_joined, *start, *end),
            })
            .count())
    }

    fn log_entries(&self, query: &LogQuery) -> AdminResult<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .log
            .read()
            .iter()
            .filter(|e| query.user_id.is_none_or(|id| e.user_id == id))
            .filter(|e| query.since.is_none_or(|since| e.action_time >= since))
            .filter(|e| query.until.is_none_or(|until| e.action_time < until))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.action_time.cmp(&a.action_time).then(b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::model::OrderingField;
    use crate::store::SearchClause;
    use serde_json::json;

    fn book() -> ModelDefinition {
        ModelDefinition::builder("library", "book")
            .id_field()
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("pages", FieldType::Integer))
            .field(FieldDescriptor::new("published", FieldType::Date))
            .field(FieldDescriptor::new("in_print", FieldType::Boolean))
            .build()
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for row in [
            json!({"id": 1, "title": "Dune", "pages": 412, "published": "1965-08-01", "in_print": true}),
            json!({"id": 2, "title": "Dune Messiah", "pages": 256, "published": "1969-10-15", "in_print": false}),
            json!({"id": 3, "title": "Neuromancer", "pages": 271, "published": "1984-07-01", "in_print": true}),
        ] {
            backend.insert("library.book", row).unwrap();
        }
        backend
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    fn filter(lookup: &str, value: FilterValue) -> RowQuery {
        RowQuery {
            filters: vec![FilterClause::new(lookup, vec![value])],
            ..RowQuery::default()
        }
    }

    #[test]
    fn test_text_lookups() {
        let backend = backend();
        let model = book();
        let rows = backend.fetch(&model, &filter("title__contains", FilterValue::Text("Dune".into()))).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);

        let rows = backend.fetch(&model, &filter("title__contains", FilterValue::Text("dune".into()))).unwrap();
        assert!(rows.is_empty());

        let rows = backend.fetch(&model, &filter("title__icontains", FilterValue::Text("dune".into()))).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
    }

    #[test]
    fn test_coercing_comparisons() {
        let backend = backend();
        let model = book();

        let rows = backend.fetch(&model, &filter("pages__gt", FilterValue::Text("260".into()))).unwrap();
        assert_eq!(ids(&rows), vec![1, 3]);

        let rows = backend.fetch(&model, &filter("in_print", FilterValue::Text("0".into()))).unwrap();
        assert_eq!(ids(&rows), vec![2]);

        let date = NaiveDate::from_ymd_opt(1969, 10, 15).unwrap();
        let rows = backend.fetch(&model, &filter("published__lt", FilterValue::Date(date))).unwrap();
        assert_eq!(ids(&rows), vec![1]);

        let rows = backend.fetch(&model, &filter("published__exact", FilterValue::Text("1969-10-15".into()))).unwrap();
        assert_eq!(ids(&rows), vec![2]);

        let rows = backend.fetch(&model, &filter("id__in", FilterValue::Text("1,3".into()))).unwrap();
        assert_eq!(ids(&rows), vec![1, 3]);
    }

    #[test]
    fn test_values_of_one_key_are_alternatives() {
        let query = RowQuery {
            filters: vec![FilterClause::new(
                "pages",
                vec![FilterValue::Integer(256), FilterValue::Integer(271)],
            )],
            ..RowQuery::default()
        };
        assert_eq!(backend().count(&book(), &query).unwrap(), 2);
    }

    #[test]
    fn test_search_ordering_and_window() {
        let backend = backend();
        let query = RowQuery {
            search: SearchClause::new(&["title".to_string()], "DUNE"),
            ordering: vec![OrderingField::desc("pages")],
            offset: 1,
            limit: Some(5),
            ..RowQuery::default()
        };
        assert_eq!(ids(&backend.fetch(&book(), &query).unwrap()), vec![2]);
        assert_eq!(backend.count(&book(), &query.for_count()).unwrap(), 2);
    }

    #[test]
    fn test_relation_paths_compare_stored_key() {
        let model = ModelDefinition::builder("library", "book")
            .id_field()
            .field(FieldDescriptor::new("author", FieldType::ForeignKey))
            .build();
        let backend = MemoryBackend::new();
        backend.insert("library.book", json!({"id": 1, "author": 7})).unwrap();
        backend.insert("library.book", json!({"id": 2, "author": 9})).unwrap();

        let rows = backend.fetch(&model, &filter("author__id__exact", FilterValue::Text("7".into()))).unwrap();
        assert_eq!(ids(&rows), vec![1]);
        let rows = backend.fetch(&model, &filter("author__id", FilterValue::Text("9".into()))).unwrap();
        assert_eq!(ids(&rows), vec![2]);
    }

    #[test]
    fn test_failures() {
        let backend = backend();
        let model = book();
        assert!(backend.fetch(&model, &filter("title__regex", FilterValue::Text("x".into()))).is_err());
        assert!(backend.insert("library.book", json!([1, 2])).is_err());

        backend.fail_table("library.book");
        assert!(matches!(backend.count(&model, &RowQuery::new()), Err(AdminError::Store(_))));
    }

    #[test]
    fn test_activity_counts() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
        let activity = MemoryActivity::new();
        activity.add_user(UserRecord::new(1, "root").staff().last_login(now).joined(now - chrono::Duration::days(30)));
        activity.add_user(UserRecord::new(2, "reader").joined(now - chrono::Duration::days(2)));

        assert_eq!(activity.count_users(&UserFilter::All).unwrap(), 2);
        assert_eq!(activity.count_users(&UserFilter::Staff).unwrap(), 1);
        let week_ago = now - chrono::Duration::days(7);
        assert_eq!(
            activity
                .count_users(&UserFilter::JoinedBetween { start: week_ago, end: None })
                .unwrap(),
            1
        );
        assert_eq!(
            activity
                .count_users(&UserFilter::LoggedInBetween { start: week_ago, end: Some(now) })
                .unwrap(),
            0
        );
    }
}
