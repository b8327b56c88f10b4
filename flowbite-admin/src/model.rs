//! Model definitions for admin

use crate::field::{FieldDescriptor, FieldType, title_case};
use serde::{Deserialize, Serialize};

/// Statically declared description of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Application the model belongs to (used in route names)
    pub app_label: String,
    /// Lower-case model name (used in URLs and route names)
    pub model_name: String,
    /// Singular display name
    pub verbose_name: String,
    /// Plural display name
    pub verbose_name_plural: String,
    /// Fields, in declaration order
    pub fields: Vec<FieldDescriptor>,
    /// Primary key field name
    pub primary_key: String,
    /// Columns of the change list
    pub list_display: Vec<String>,
    /// Fields searched by the `q` parameter
    pub search_fields: Vec<String>,
    /// Default ordering
    pub ordering: Vec<OrderingField>,
    /// Public URL template for a row, `{pk}` is replaced by the key
    pub view_on_site: Option<String>,
    /// Icon (for sidebar)
    pub icon: Option<String>,
}

impl ModelDefinition {
    /// Create a new model definition builder
    pub fn builder(app_label: impl Into<String>, model_name: impl Into<String>) -> ModelDefinitionBuilder {
        ModelDefinitionBuilder::new(app_label, model_name)
    }

    /// `app_label.model_name`
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Get a field by name; `pk` resolves to the primary key.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        let name = if name == "pk" { self.primary_key.as_str() } else { name };
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the advanced filter form offers inputs for.
    pub fn filterable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_filterable())
    }

    /// Searchable fields that exist on the model
    pub fn searchable_fields(&self) -> Vec<&FieldDescriptor> {
        self.search_fields
            .iter()
            .filter_map(|name| self.get_field(name))
            .collect()
    }

    /// Get primary key field
    pub fn pk_field(&self) -> Option<&FieldDescriptor> {
        self.get_field(&self.primary_key)
    }

    /// Public URL of a row, if the model has one.
    pub fn view_on_site_url(&self, pk: &str) -> Option<String> {
        self.view_on_site
            .as_ref()
            .map(|template| template.replace("{pk}", pk))
    }

    /// Plural name with the first letter capitalised.
    pub fn verbose_name_plural_capitalized(&self) -> String {
        capfirst(&self.verbose_name_plural)
    }
}

pub(crate) fn capfirst(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builder for model definitions
pub struct ModelDefinitionBuilder {
    app_label: String,
    model_name: String,
    verbose_name: Option<String>,
    verbose_name_plural: Option<String>,
    fields: Vec<FieldDescriptor>,
    primary_key: String,
    list_display: Vec<String>,
    search_fields: Vec<String>,
    ordering: Vec<OrderingField>,
    view_on_site: Option<String>,
    icon: Option<String>,
}

impl ModelDefinitionBuilder {
    /// Create a new builder
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.into().to_lowercase(),
            verbose_name: None,
            verbose_name_plural: None,
            fields: Vec::new(),
            primary_key: "id".to_string(),
            list_display: Vec::new(),
            search_fields: Vec::new(),
            ordering: Vec::new(),
            view_on_site: None,
            icon: None,
        }
    }

    /// Set singular verbose name
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = Some(name.into());
        self
    }

    /// Set plural verbose name
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = Some(name.into());
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        if field.primary_key {
            self.primary_key = field.name.clone();
        }
        self.fields.push(field);
        self
    }

    /// Add an auto-incrementing `id` primary key
    pub fn id_field(self) -> Self {
        self.field(
            FieldDescriptor::new("id", FieldType::Auto)
                .primary_key()
                .label("ID"),
        )
    }

    /// Set list display fields
    pub fn list_display(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.list_display = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set search fields
    pub fn search_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set ordering
    pub fn ordering(mut self, fields: impl IntoIterator<Item = OrderingField>) -> Self {
        self.ordering = fields.into_iter().collect();
        self
    }

    /// Set the public URL template (`/books/{pk}/`)
    pub fn view_on_site(mut self, template: impl Into<String>) -> Self {
        self.view_on_site = Some(template.into());
        self
    }

    /// Set icon
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Build the model definition
    pub fn build(self) -> ModelDefinition {
        let verbose_name = self
            .verbose_name
            .unwrap_or_else(|| self.model_name.replace('_', " "));

        let verbose_name_plural = self
            .verbose_name_plural
            .unwrap_or_else(|| format!("{}s", verbose_name));

        // Without explicit columns the first five fields are listed
        let list_display = if self.list_display.is_empty() {
            self.fields.iter().take(5).map(|f| f.name.clone()).collect()
        } else {
            self.list_display
        };

        ModelDefinition {
            app_label: self.app_label,
            model_name: self.model_name,
            verbose_name,
            verbose_name_plural,
            fields: self.fields,
            primary_key: self.primary_key,
            list_display,
            search_fields: self.search_fields,
            ordering: self.ordering,
            view_on_site: self.view_on_site,
            icon: self.icon,
        }
    }
}

/// Ordering field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingField {
    /// Field name
    pub field: String,
    /// Is descending?
    pub descending: bool,
}

impl OrderingField {
    /// Ascending order
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `-field` / `field`.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(value),
        }
    }

    /// Signed representation (`-field` when descending)
    pub fn as_expression(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

/// Column header label for a `list_display` entry.
pub(crate) fn column_label(model: &ModelDefinition, name: &str) -> String {
    match model.get_field(name) {
        Some(field) => field.label.clone(),
        None => title_case(&name.replace('_', " ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ModelDefinition {
        ModelDefinition::builder("library", "Book")
            .id_field()
            .field(FieldDescriptor::new("title", FieldType::String))
            .field(FieldDescriptor::new("published", FieldType::Date))
            .field(FieldDescriptor::new("tags", FieldType::ManyToMany))
            .search_fields(["title"])
            .view_on_site("/books/{pk}/")
            .build()
    }

    #[test]
    fn test_model_builder() {
        let model = book();

        assert_eq!(model.model_name, "book");
        assert_eq!(model.verbose_name_plural, "books");
        assert_eq!(model.label(), "library.book");
        assert_eq!(model.primary_key, "id");
        assert_eq!(model.list_display, vec!["id", "title", "published", "tags"]);
        assert_eq!(model.verbose_name_plural_capitalized(), "Books");
    }

    #[test]
    fn test_field_lookup_and_pk_alias() {
        let model = book();
        assert_eq!(model.get_field("pk").map(|f| f.name.as_str()), Some("id"));
        assert!(model.get_field("missing").is_none());

        let filterable: Vec<_> = model.filterable_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(filterable, vec!["title", "published"]);
    }

    #[test]
    fn test_view_on_site() {
        assert_eq!(book().view_on_site_url("7").as_deref(), Some("/books/7/"));
    }

    #[test]
    fn test_ordering() {
        let desc = OrderingField::parse("-published");
        assert_eq!(desc, OrderingField::desc("published"));
        assert_eq!(desc.as_expression(), "-published");
        assert_eq!(OrderingField::parse("title").as_expression(), "title");
    }

    #[test]
    fn test_column_label_fallback() {
        let model = book();
        assert_eq!(column_label(&model, "title"), "Title");
        assert_eq!(column_label(&model, "page_count"), "Page Count");
    }
}
