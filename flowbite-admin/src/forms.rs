//! Advanced filter form
//!
//! One input per (filterable field, permitted operator) pair. Submitted
//! values are coerced per field type; a single rejected value makes the whole
//! form invalid and it then contributes no lookups at all.

use crate::config::FILTER_INPUT_CLASS;
use crate::field::{Choice, FieldDescriptor, FieldType};
use crate::lookup::{AdvancedLookup, LookupOperator, operators_for};
use crate::model::ModelDefinition;
use crate::query::QueryParams;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Control rendered for an input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Number,
    Email,
    Date,
    DateTime,
    Time,
    /// Select with an empty first option
    Select { choices: Vec<Choice> },
}

impl InputKind {
    fn for_field(field: &FieldDescriptor, operator: LookupOperator) -> Self {
        if operator.is_containment() {
            return Self::Text;
        }
        match field.field_type {
            FieldType::Boolean => Self::Select {
                choices: vec![
                    Choice::new("", "---------"),
                    Choice::new("1", "Yes"),
                    Choice::new("0", "No"),
                ],
            },
            FieldType::Enum => {
                let mut choices = vec![Choice::new("", "---------")];
                choices.extend(field.choices.iter().flatten().cloned());
                Self::Select { choices }
            }
            FieldType::Email => Self::Email,
            FieldType::Date => Self::Date,
            FieldType::DateTime => Self::DateTime,
            FieldType::Time => Self::Time,
            FieldType::Auto
            | FieldType::Integer
            | FieldType::BigInteger
            | FieldType::SmallInteger
            | FieldType::PositiveInteger
            | FieldType::Float
            | FieldType::Decimal
            | FieldType::Duration
            | FieldType::ForeignKey
            | FieldType::OneToOne => Self::Number,
            _ => Self::Text,
        }
    }

    /// HTML `type` attribute for `<input>` controls
    pub fn html_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Select { .. } => "text",
            Self::Number => "number",
            Self::Email => "email",
            Self::Date => "date",
            Self::DateTime => "datetime-local",
            Self::Time => "time",
        }
    }
}

/// A validated filter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl FilterValue {
    /// Canonical query-string representation
    pub fn to_query_value(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Time(t) => t.format("%H:%M:%S").to_string(),
            Self::Uuid(u) => u.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// JSON representation used when comparing against stored rows
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Bool(b) => Value::Bool(*b),
            Self::Json(v) => v.clone(),
            other => Value::String(other.to_query_value()),
        }
    }

    /// Empty strings, nulls and empty sequences never constrain anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Json(serde_json::Value::Null) => true,
            Self::Json(serde_json::Value::Array(items)) => items.is_empty(),
            _ => false,
        }
    }
}

/// One generated filter control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterInput {
    /// Query-string key (`af__title__contains`)
    pub name: String,
    /// `"{field label} ({operator})"`
    pub label: String,
    pub lookup: AdvancedLookup,
    pub field_type: FieldType,
    pub kind: InputKind,
    pub css_class: String,
    /// Submitted value, as typed
    pub value: Option<String>,
    /// Validation messages
    pub errors: Vec<String>,
    #[serde(skip)]
    cleaned: Option<FilterValue>,
}

impl FilterInput {
    fn new(field: &FieldDescriptor, operator: LookupOperator, prefix: &str) -> Self {
        let lookup = AdvancedLookup::new(field.name.clone(), operator);
        Self {
            name: lookup.query_key(prefix),
            label: format!("{} ({})", field.label, operator),
            kind: InputKind::for_field(field, operator),
            field_type: field.field_type,
            css_class: FILTER_INPUT_CLASS.to_string(),
            lookup,
            value: None,
            errors: Vec::new(),
            cleaned: None,
        }
    }

    fn bind(&mut self, raw: &str, field: &FieldDescriptor) {
        self.value = Some(raw.to_string());
        match clean_value(field, self.lookup.operator, raw) {
            Ok(value) => self.cleaned = value,
            Err(message) => self.errors.push(message),
        }
    }

    /// Validated value, if one was submitted
    pub fn cleaned(&self) -> Option<&FilterValue> {
        self.cleaned.as_ref()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Dynamic filter form derived from a model's field table
#[derive(Debug, Clone)]
pub struct AdvancedFilterForm {
    prefix: String,
    inputs: Vec<FilterInput>,
    bound: bool,
}

impl AdvancedFilterForm {
    /// Build the form; `data` binds it (an empty parameter set leaves it unbound).
    pub fn new(model: &ModelDefinition, data: Option<&QueryParams>, prefix: &str) -> Self {
        let data = data.filter(|params| !params.is_empty());
        let mut inputs = Vec::new();

        for field in model.filterable_fields() {
            for operator in operators_for(field) {
                let mut input = FilterInput::new(field, *operator, prefix);
                if let Some(raw) = data.and_then(|params| params.get(&input.name)) {
                    input.bind(raw, field);
                }
                inputs.push(input);
            }
        }

        Self {
            prefix: prefix.to_string(),
            inputs,
            bound: data.is_some(),
        }
    }

    /// Replace the class attribute of every control
    pub fn with_input_class(mut self, class: &str) -> Self {
        for input in &mut self.inputs {
            input.css_class = class.to_string();
        }
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Bound and free of validation errors
    pub fn is_valid(&self) -> bool {
        self.bound && self.inputs.iter().all(|input| !input.has_errors())
    }

    pub fn inputs(&self) -> &[FilterInput] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&FilterInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Lookup behind a generated parameter name
    pub fn lookup_for(&self, name: &str) -> Option<&AdvancedLookup> {
        self.input(name).map(|input| &input.lookup)
    }

    /// Validation messages keyed by parameter name
    pub fn errors(&self) -> BTreeMap<&str, &[String]> {
        self.inputs
            .iter()
            .filter(|input| input.has_errors())
            .map(|input| (input.name.as_str(), input.errors.as_slice()))
            .collect()
    }

    /// Applied (input, value) pairs in form order; empty unless valid.
    pub fn cleaned_lookups(&self) -> Vec<(&FilterInput, &FilterValue)> {
        if !self.is_valid() {
            return Vec::new();
        }
        self.inputs
            .iter()
            .filter_map(|input| input.cleaned().map(|value| (input, value)))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    /// ORM lookup -> value for every applied lookup
    pub fn get_lookup_filters(&self) -> BTreeMap<String, FilterValue> {
        self.cleaned_lookups()
            .into_iter()
            .map(|(input, value)| (input.lookup.orm_lookup(), value.clone()))
            .collect()
    }

    /// Same as [`Self::get_lookup_filters`] with one-element value lists
    pub fn get_lookup_params(&self) -> BTreeMap<String, Vec<FilterValue>> {
        self.get_lookup_filters()
            .into_iter()
            .map(|(key, value)| (key, vec![value]))
            .collect()
    }

    /// Every generated parameter name, submitted or not
    pub fn get_query_parameter_names(&self) -> Vec<String> {
        self.inputs.iter().map(|input| input.name.clone()).collect()
    }
}

/// Coerce a raw submitted value; `Ok(None)` means "not submitted".
pub fn clean_value(
    field: &FieldDescriptor,
    operator: LookupOperator,
    raw: &str,
) -> Result<Option<FilterValue>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if operator.is_containment() {
        return Ok(Some(FilterValue::Text(raw.to_string())));
    }

    let value = match field.field_type {
        FieldType::Boolean => match raw {
            "1" => FilterValue::Bool(true),
            "0" => FilterValue::Bool(false),
            _ => return Err(format!("Select a valid choice. {} is not one of the available choices.", raw)),
        },
        FieldType::Float | FieldType::Decimal => {
            let number: f64 = raw
                .parse()
                .map_err(|_| "Enter a number.".to_string())?;
            if !number.is_finite() {
                return Err("Enter a number.".to_string());
            }
            FilterValue::Float(number)
        }
        FieldType::PositiveInteger => {
            let number = parse_integer(raw)?;
            if number < 0 {
                return Err("Ensure this value is greater than or equal to 0.".to_string());
            }
            FilterValue::Integer(number)
        }
        t if t.is_integral() => FilterValue::Integer(parse_integer(raw)?),
        FieldType::Date => FilterValue::Date(parse_date(raw).ok_or("Enter a valid date.")?),
        FieldType::DateTime => FilterValue::DateTime(
            parse_datetime(raw).ok_or("Enter a valid date/time.")?,
        ),
        FieldType::Time => FilterValue::Time(parse_time(raw).ok_or("Enter a valid time.")?),
        FieldType::Uuid => FilterValue::Uuid(
            uuid::Uuid::parse_str(raw).map_err(|_| "Enter a valid UUID.".to_string())?,
        ),
        FieldType::IpAddress => {
            let ip: IpAddr = raw
                .parse()
                .map_err(|_| "Enter a valid IPv4 or IPv6 address.".to_string())?;
            FilterValue::Text(ip.to_string())
        }
        FieldType::Email => {
            if !is_valid_email(raw) {
                return Err("Enter a valid email address.".to_string());
            }
            FilterValue::Text(raw.to_string())
        }
        FieldType::Slug => {
            if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err("Enter a valid \u{201c}slug\u{201d} consisting of letters, numbers, underscores or hyphens.".to_string());
            }
            FilterValue::Text(raw.to_string())
        }
        FieldType::Enum => {
            let known = field
                .choices
                .as_ref()
                .is_none_or(|choices| choices.iter().any(|c| c.value == raw));
            if !known {
                return Err(format!("Select a valid choice. {} is not one of the available choices.", raw));
            }
            FilterValue::Text(raw.to_string())
        }
        FieldType::Json => FilterValue::Json(
            serde_json::from_str(raw).map_err(|_| "Enter a valid JSON.".to_string())?,
        ),
        _ => FilterValue::Text(raw.to_string()),
    };

    Ok(Some(value))
}

fn parse_integer(raw: &str) -> Result<i64, String> {
    raw.parse().map_err(|_| "Enter a whole number.".to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

fn is_valid_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !raw.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ModelDefinition {
        ModelDefinition::builder("library", "book")
            .id_field()
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("pages", FieldType::Integer))
            .field(FieldDescriptor::new("published", FieldType::Date))
            .field(FieldDescriptor::new("in_print", FieldType::Boolean))
            .field(FieldDescriptor::new("tags", FieldType::ManyToMany))
            .build()
    }

    fn params(query: &str) -> QueryParams {
        QueryParams::parse(query).unwrap()
    }

    #[test]
    fn test_generated_inputs() {
        let form = AdvancedFilterForm::new(&book(), None, "af__");
        let names = form.get_query_parameter_names();

        assert_eq!(names.len(), 3 + 5 + 3 + 1);
        assert_eq!(names[0], "af__title__contains");
        assert_eq!(names[3], "af__pages__exact");
        assert!(!names.iter().any(|n| n.contains("tags") || n.starts_with("af__id")));

        let input = form.input("af__published__gt").unwrap();
        assert_eq!(input.label, "Published (gt)");
        assert_eq!(input.kind, InputKind::Date);
        assert_eq!(input.css_class, FILTER_INPUT_CLASS);
    }

    #[test]
    fn test_boolean_is_tristate_select() {
        let form = AdvancedFilterForm::new(&book(), None, "af__");
        match &form.input("af__in_print__exact").unwrap().kind {
            InputKind::Select { choices } => {
                let values: Vec<_> = choices.iter().map(|c| c.value.as_str()).collect();
                assert_eq!(values, vec!["", "1", "0"]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_containment_is_always_text() {
        let model = ModelDefinition::builder("net", "host")
            .id_field()
            .field(FieldDescriptor::new("token", FieldType::Uuid))
            .build();
        let form = AdvancedFilterForm::new(&model, Some(&params("af__token__contains=abc")), "af__");

        assert_eq!(form.input("af__token__contains").unwrap().kind, InputKind::Text);
        assert!(form.is_valid());
        assert_eq!(
            form.get_lookup_filters().get("token__contains"),
            Some(&FilterValue::Text("abc".into()))
        );
    }

    #[test]
    fn test_unbound_form() {
        let form = AdvancedFilterForm::new(&book(), Some(&QueryParams::new()), "af__");
        assert!(!form.is_bound());
        assert!(!form.is_valid());
        assert!(form.get_lookup_filters().is_empty());
    }

    #[test]
    fn test_lookup_filters_skip_empty_values() {
        let form = AdvancedFilterForm::new(
            &book(),
            Some(&params("af__title__contains=Rust&af__pages__gt=&af__in_print__exact=0&other=1")),
            "af__",
        );

        assert!(form.is_valid());
        let filters = form.get_lookup_filters();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["title__contains"], FilterValue::Text("Rust".into()));
        assert_eq!(filters["in_print"], FilterValue::Bool(false));

        let lookup_params = form.get_lookup_params();
        assert_eq!(lookup_params["in_print"], vec![FilterValue::Bool(false)]);
    }

    #[test]
    fn test_invalid_value_fails_closed() {
        let form = AdvancedFilterForm::new(
            &book(),
            Some(&params("af__title__contains=Rust&af__pages__gt=many")),
            "af__",
        );

        assert!(form.is_bound());
        assert!(!form.is_valid());
        assert!(form.get_lookup_filters().is_empty());

        let input = form.input("af__pages__gt").unwrap();
        assert_eq!(input.value.as_deref(), Some("many"));
        assert_eq!(input.errors, vec!["Enter a whole number.".to_string()]);
        assert_eq!(form.errors().len(), 1);
    }

    #[test]
    fn test_date_formats() {
        let field = FieldDescriptor::new("published", FieldType::Date);
        let expected = Some(FilterValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        for raw in ["2024-02-01", "02/01/2024", "02/01/24", " 2024-02-01 "] {
            assert_eq!(clean_value(&field, LookupOperator::Exact, raw), Ok(expected.clone()));
        }
        assert!(clean_value(&field, LookupOperator::Gt, "2024-13-01").is_err());
    }

    #[test]
    fn test_other_coercions() {
        let datetime = FieldDescriptor::new("seen", FieldType::DateTime);
        assert_eq!(
            clean_value(&datetime, LookupOperator::Gt, "2024-02-01").unwrap().unwrap().to_query_value(),
            "2024-02-01 00:00:00"
        );

        let ip = FieldDescriptor::new("ip", FieldType::IpAddress);
        assert!(clean_value(&ip, LookupOperator::Exact, "10.0.0.300").is_err());

        let email = FieldDescriptor::new("email", FieldType::Email);
        assert!(clean_value(&email, LookupOperator::Exact, "a@example.com").is_ok());
        assert!(clean_value(&email, LookupOperator::Exact, "a@localhost").is_err());

        let slug = FieldDescriptor::new("slug", FieldType::Slug);
        assert!(clean_value(&slug, LookupOperator::Exact, "not a slug").is_err());

        let flag = FieldDescriptor::new("flag", FieldType::Boolean);
        assert!(clean_value(&flag, LookupOperator::Exact, "true").is_err());
        assert_eq!(clean_value(&flag, LookupOperator::Exact, ""), Ok(None));

        let author = FieldDescriptor::new("author", FieldType::ForeignKey);
        assert_eq!(
            clean_value(&author, LookupOperator::Exact, "12"),
            Ok(Some(FilterValue::Integer(12)))
        );
    }

    #[test]
    fn test_json_empty_sequence_excluded() {
        let model = ModelDefinition::builder("app", "doc")
            .id_field()
            .field(FieldDescriptor::new("payload", FieldType::Json))
            .build();
        let form = AdvancedFilterForm::new(&model, Some(&params("af__payload__exact=%5B%5D")), "af__");
        assert!(form.is_valid());
        assert!(form.get_lookup_filters().is_empty());
    }
}
