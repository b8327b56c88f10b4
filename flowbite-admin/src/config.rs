//! Admin configuration

use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use validator::Validate;

/// Tailwind classes applied to every advanced filter control.
pub const FILTER_INPUT_CLASS: &str = "block w-full rounded-lg border border-gray-200 bg-white p-2.5 text-sm text-gray-900 \
focus:border-blue-500 focus:ring-blue-500 dark:border-gray-700 dark:bg-gray-900/40 dark:text-white";

/// Prefix for environment overrides (`FLOWBITE_ADMIN_TITLE`, ...).
pub const ENV_PREFIX: &str = "FLOWBITE_ADMIN";

/// Admin site configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdminConfig {
    /// Browser title suffix
    #[validate(length(min = 1))]
    pub title: String,
    /// Heading of the dashboard page
    pub index_title: String,
    /// Text shown in the top bar
    pub site_header: String,
    /// Mount point (e.g., "/admin"), stored without a trailing slash
    #[validate(length(min = 1))]
    pub base_path: String,
    /// Namespace used for route names (`{site_name}:index`)
    #[validate(length(min = 1))]
    pub site_name: String,
    /// Rows per change-list page
    #[validate(range(min = 1, max = 1000))]
    pub items_per_page: usize,
    /// Largest result count for which "show all" is honoured
    #[validate(range(min = 1))]
    pub max_show_all: usize,
    /// Query-string prefix of advanced filter parameters
    #[validate(length(min = 1))]
    pub advanced_filter_prefix: String,
    /// Session key holding the dashboard widget order
    #[validate(length(min = 1))]
    pub widget_session_key: String,
    /// Entries in the "recent actions" widget
    pub recent_actions_limit: usize,
    /// Entries in the top-bar notification dropdown
    pub notifications_limit: usize,
    /// Tables in the "top models" widget
    pub top_models_limit: usize,
    /// Model holding admin accounts, used for the profile link
    pub user_model: UserModelRef,
    /// Theme settings
    pub theme: Theme,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            title: "Flowbite Admin".to_string(),
            index_title: "Dashboard".to_string(),
            site_header: "Flowbite Admin".to_string(),
            base_path: "/admin".to_string(),
            site_name: "admin".to_string(),
            items_per_page: 100,
            max_show_all: 200,
            advanced_filter_prefix: "af__".to_string(),
            widget_session_key: "flowbite_admin_widget_layout".to_string(),
            recent_actions_limit: 8,
            notifications_limit: 6,
            top_models_limit: 5,
            user_model: UserModelRef::default(),
            theme: Theme::default(),
        }
    }
}

impl AdminConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> AdminResult<Self> {
        let config: AdminConfig = toml::from_str(content)?;
        config.validated()
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AdminResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdminError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults or the given file, then `FLOWBITE_ADMIN_*` overrides.
    pub fn load(path: Option<&Path>) -> AdminResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply `FLOWBITE_ADMIN_*` environment variables.
    pub fn with_env_overrides(mut self) -> AdminResult<Self> {
        if let Some(title) = env_var("TITLE") {
            self.title = title;
        }
        if let Some(path) = env_var("BASE_PATH") {
            self.base_path = path;
        }
        if let Some(name) = env_var("SITE_NAME") {
            self.site_name = name;
        }
        if let Some(prefix) = env_var("FILTER_PREFIX") {
            self.advanced_filter_prefix = prefix;
        }
        if let Some(raw) = env_var("ITEMS_PER_PAGE") {
            self.items_per_page = raw.parse().map_err(|_| {
                AdminError::Config(format!("{}_ITEMS_PER_PAGE is not a number: {}", ENV_PREFIX, raw))
            })?;
        }
        self.validated()
    }

    /// Normalize and validate.
    pub fn validated(mut self) -> AdminResult<Self> {
        let trimmed = self.base_path.trim_end_matches('/');
        self.base_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self.validate()?;
        Ok(self)
    }

    /// Build an absolute admin path from a suffix.
    pub fn path(&self, suffix: &str) -> String {
        format!("{}/{}", self.base_path, suffix.trim_start_matches('/'))
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, key))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Reference to the model that stores admin accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModelRef {
    pub app_label: String,
    pub model_name: String,
}

impl Default for UserModelRef {
    fn default() -> Self {
        Self {
            app_label: "auth".to_string(),
            model_name: "user".to_string(),
        }
    }
}

/// Theme configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Colour scheme selection
    pub mode: ThemeMode,
    /// Primary colour (links, primary buttons)
    pub primary_color: String,
    /// Page background
    pub background_color: String,
    /// Cards and tables
    pub surface_color: String,
    /// Body text
    pub text_color: String,
    /// Borders and dividers
    pub border_color: String,
    /// Positive change badges
    pub success_color: String,
    /// Warning badges
    pub warning_color: String,
    /// Danger actions
    pub error_color: String,
    /// Font stack
    pub font_family: String,
    /// Class attribute of advanced filter controls
    pub input_class: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            mode: ThemeMode::System,
            ..Self::light()
        }
    }
}

impl Theme {
    /// Flowbite light palette
    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,
            primary_color: "#1c64f2".to_string(),    // blue-600
            background_color: "#f9fafb".to_string(), // gray-50
            surface_color: "#ffffff".to_string(),
            text_color: "#111827".to_string(),   // gray-900
            border_color: "#e5e7eb".to_string(), // gray-200
            success_color: "#0e9f6e".to_string(),
            warning_color: "#c27803".to_string(),
            error_color: "#e02424".to_string(),
            font_family: "'Inter', ui-sans-serif, system-ui, sans-serif".to_string(),
            input_class: FILTER_INPUT_CLASS.to_string(),
        }
    }

    /// Flowbite dark palette
    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            primary_color: "#3f83f8".to_string(),    // blue-500
            background_color: "#111827".to_string(), // gray-900
            surface_color: "#1f2937".to_string(),    // gray-800
            text_color: "#f9fafb".to_string(),
            border_color: "#374151".to_string(), // gray-700
            success_color: "#31c48d".to_string(),
            warning_color: "#e3a008".to_string(),
            error_color: "#f05252".to_string(),
            ..Self::light()
        }
    }

    /// Render the palette as CSS custom properties.
    pub fn to_css_variables(&self) -> String {
        format!(
            r#":root {{
  --fb-primary: {};
  --fb-bg: {};
  --fb-surface: {};
  --fb-text: {};
  --fb-border: {};
  --fb-success: {};
  --fb-warning: {};
  --fb-error: {};
  --fb-font: {};
}}"#,
            self.primary_color,
            self.background_color,
            self.surface_color,
            self.text_color,
            self.border_color,
            self.success_color,
            self.warning_color,
            self.error_color,
            self.font_family,
        )
    }

    /// Class placed on `<html>`; `None` lets the browser preference decide.
    pub fn html_class(&self) -> Option<&'static str> {
        match self.mode {
            ThemeMode::Dark => Some("dark"),
            ThemeMode::Light => Some("light"),
            ThemeMode::System => None,
        }
    }
}

/// Theme mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}
