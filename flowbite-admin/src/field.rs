//! Field descriptors for admin models
//!
//! Descriptors are declared once per model when the site is built and are
//! never mutated afterwards. Everything the filter form needs to know about a
//! field (its type category, label and whether it can be filtered at all) is
//! derived from them.

use serde::{Deserialize, Serialize};

/// Static description of one model field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name (column / row key)
    pub name: String,
    /// Display label
    pub label: String,
    /// Declared field type
    pub field_type: FieldType,
    /// Is this the primary key?
    pub primary_key: bool,
    /// Target model of a relation (`app_label.model_name`)
    pub related_model: Option<String>,
    /// Choices for enumerated fields
    pub choices: Option<Vec<Choice>>,
    /// Help text
    pub help_text: Option<String>,
}

impl FieldDescriptor {
    /// Create a new descriptor; the label is the title-cased name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        let label = title_case(&name.replace('_', " "));

        Self {
            name,
            label,
            field_type,
            primary_key: false,
            related_model: None,
            choices: None,
            help_text: None,
        }
    }

    /// Set custom label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set as primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Point a relation at its target model
    pub fn related_to(mut self, model: impl Into<String>) -> Self {
        self.related_model = Some(model.into());
        self
    }

    /// Set choices
    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(choices);
        self
    }

    /// Set help text
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    /// Type category driving the permitted lookups.
    pub fn category(&self) -> FieldCategory {
        self.field_type.category()
    }

    /// Reverse relations have no column of their own.
    pub fn is_concrete(&self) -> bool {
        !matches!(self.field_type, FieldType::ReverseRelation)
    }

    /// Many-to-many and reverse relations hold several values per row.
    pub fn is_many_valued(&self) -> bool {
        matches!(
            self.field_type,
            FieldType::ManyToMany | FieldType::ReverseRelation
        )
    }

    /// Auto-generated keys and binary blobs are never edited through forms.
    pub fn has_form_representation(&self) -> bool {
        !matches!(self.field_type, FieldType::Auto | FieldType::Binary)
    }

    /// Whether the advanced filter form offers inputs for this field.
    pub fn is_filterable(&self) -> bool {
        self.is_concrete() && !self.is_many_valued() && self.has_form_representation()
    }
}

/// Python-style `str.title()` on a space separated label.
pub(crate) fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declared field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Auto-incrementing primary key
    Auto,
    /// Integer
    Integer,
    /// Big integer
    BigInteger,
    /// Small integer
    SmallInteger,
    /// Non-negative integer
    PositiveInteger,
    /// Float
    Float,
    /// Decimal
    Decimal,
    /// Duration stored as whole seconds
    Duration,
    /// Short string
    String,
    /// Long text
    Text,
    /// Email address
    Email,
    /// Slug
    Slug,
    /// URL
    Url,
    /// UUID
    Uuid,
    /// IP address
    IpAddress,
    /// String restricted to choices
    Enum,
    /// Boolean
    Boolean,
    /// Date
    Date,
    /// DateTime
    DateTime,
    /// Time of day
    Time,
    /// Foreign key
    ForeignKey,
    /// One-to-one relation
    OneToOne,
    /// Many-to-many relation
    ManyToMany,
    /// Reverse side of a foreign key
    ReverseRelation,
    /// JSON document
    Json,
    /// Binary blob
    Binary,
}

impl FieldType {
    /// Category of this type.
    pub fn category(&self) -> FieldCategory {
        match self {
            Self::String
            | Self::Text
            | Self::Email
            | Self::Slug
            | Self::Url
            | Self::Uuid
            | Self::IpAddress
            | Self::Enum => FieldCategory::Text,
            Self::Auto
            | Self::Integer
            | Self::BigInteger
            | Self::SmallInteger
            | Self::PositiveInteger
            | Self::Float
            | Self::Decimal
            | Self::Duration => FieldCategory::Numeric,
            Self::Date | Self::DateTime | Self::Time => FieldCategory::Temporal,
            Self::Boolean => FieldCategory::Boolean,
            Self::ForeignKey | Self::OneToOne => FieldCategory::Relation,
            Self::ManyToMany | Self::ReverseRelation | Self::Json | Self::Binary => {
                FieldCategory::Other
            }
        }
    }

    /// Whether values of this type are whole numbers.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::Auto
                | Self::Integer
                | Self::BigInteger
                | Self::SmallInteger
                | Self::PositiveInteger
                | Self::Duration
                | Self::ForeignKey
                | Self::OneToOne
        )
    }
}

/// Type categories the lookup catalog understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    Text,
    Numeric,
    Temporal,
    Boolean,
    Relation,
    /// Anything the catalog has no dedicated policy for
    Other,
}

/// Choice for enumerated fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Value stored
    pub value: String,
    /// Display label
    pub label: String,
}

impl Choice {
    /// Create a new choice
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_label() {
        let field = FieldDescriptor::new("date_joined", FieldType::DateTime);
        assert_eq!(field.label, "Date Joined");
        assert_eq!(field.category(), FieldCategory::Temporal);
    }

    #[test]
    fn test_title_case_lowercases_tail() {
        assert_eq!(title_case("ISBN code"), "Isbn Code");
    }

    #[test]
    fn test_filterable_fields() {
        assert!(FieldDescriptor::new("title", FieldType::String).is_filterable());
        assert!(FieldDescriptor::new("author", FieldType::ForeignKey).is_filterable());
        assert!(!FieldDescriptor::new("tags", FieldType::ManyToMany).is_filterable());
        assert!(!FieldDescriptor::new("reviews", FieldType::ReverseRelation).is_filterable());
        assert!(!FieldDescriptor::new("id", FieldType::Auto).is_filterable());
        assert!(!FieldDescriptor::new("cover", FieldType::Binary).is_filterable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(FieldType::Uuid.category(), FieldCategory::Text);
        assert_eq!(FieldType::Duration.category(), FieldCategory::Numeric);
        assert_eq!(FieldType::OneToOne.category(), FieldCategory::Relation);
        assert_eq!(FieldType::Json.category(), FieldCategory::Other);
    }
}
