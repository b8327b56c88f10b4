//! UI building blocks handed to templates

use crate::field::FieldType;
use serde::{Deserialize, Serialize};

/// Pagination info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Current page (1-indexed)
    pub page: usize,
    /// Total pages
    pub total_pages: usize,
    /// Items per page
    pub per_page: usize,
    /// Total items
    pub total_items: usize,
    /// Has previous page
    pub has_prev: bool,
    /// Has next page
    pub has_next: bool,
    /// Start item number (for display)
    pub start_item: usize,
    /// End item number (for display)
    pub end_item: usize,
}

impl Pagination {
    /// Create pagination info
    pub fn new(page: usize, per_page: usize, total_items: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_items.div_ceil(per_page);
        let page = page.min(total_pages).max(1);
        let start_item = (page - 1) * per_page + 1;
        let end_item = (start_item + per_page - 1).min(total_items);

        Self {
            page,
            total_pages,
            per_page,
            total_items,
            has_prev: page > 1,
            has_next: page < total_pages,
            start_item: if total_items > 0 { start_item } else { 0 },
            end_item,
        }
    }

    /// Page numbers with ellipses, `window` pages either side of the current one
    pub fn page_numbers(&self, window: usize) -> Vec<PageNumber> {
        let mut pages = Vec::new();

        if self.total_pages == 0 {
            return pages;
        }

        pages.push(PageNumber::Page(1));

        let start = self.page.saturating_sub(window).max(2);
        let end = (self.page + window).min(self.total_pages - 1);

        if start > 2 {
            pages.push(PageNumber::Ellipsis);
        }

        for p in start..=end {
            pages.push(PageNumber::Page(p));
        }

        if end < self.total_pages - 1 {
            pages.push(PageNumber::Ellipsis);
        }

        if self.total_pages > 1 {
            pages.push(PageNumber::Page(self.total_pages));
        }

        pages
    }
}

/// Page number for pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageNumber {
    /// A specific page
    Page(usize),
    /// Ellipsis (...)
    Ellipsis,
}

/// Breadcrumb item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Label
    pub label: String,
    /// URL (None for current page)
    pub url: Option<String>,
}

impl Breadcrumb {
    /// Create a breadcrumb
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: None,
        }
    }

    /// With URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Change-list column header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableColumn {
    /// Field name
    pub field: String,
    /// Display label
    pub label: String,
    /// Is sortable?
    pub sortable: bool,
    /// Current sort direction (if sorted)
    pub sort_direction: Option<SortDirection>,
    /// 1-based position among the sorted columns
    pub sort_priority: Option<usize>,
    /// Query string that toggles sorting on this column
    pub sort_url: Option<String>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Table cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    /// Field name
    pub field: String,
    /// Raw value
    pub value: serde_json::Value,
    /// Escaped display text
    pub rendered: String,
    /// Cell type
    pub cell_type: CellType,
}

/// Cell type for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Text,
    Number,
    Boolean,
    Date,
    DateTime,
    Email,
    Url,
}

impl CellType {
    /// Cell type for a declared field type
    pub fn for_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean,
            FieldType::Date => Self::Date,
            FieldType::DateTime => Self::DateTime,
            FieldType::Email => Self::Email,
            FieldType::Url => Self::Url,
            t if t.category() == crate::field::FieldCategory::Numeric => Self::Number,
            _ => Self::Text,
        }
    }
}

/// Render a stored value for a change-list cell
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Bool(true) => {
            r#"<span class="rounded bg-green-100 px-2.5 py-0.5 text-xs font-medium text-green-800 dark:bg-green-900 dark:text-green-300">Yes</span>"#.to_string()
        }
        serde_json::Value::Bool(false) => {
            r#"<span class="rounded bg-red-100 px-2.5 py-0.5 text-xs font-medium text-red-800 dark:bg-red-900 dark:text-red-300">No</span>"#.to_string()
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) if s.is_empty() => "-".to_string(),
        serde_json::Value::String(s) => html_escape(s),
        serde_json::Value::Array(items) => format!("[{} items]", items.len()),
        serde_json::Value::Object(_) => "[Object]".to_string(),
    }
}

/// Escape text for HTML
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
